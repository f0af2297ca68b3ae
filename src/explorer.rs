use rayon::prelude::*;
use tracing::info;

use crate::build_target::{discover_build_targets, link_base_profiles, map_base_profiles};
use crate::config::ExplorerConfig;
use crate::ebuild::collect_ebuilds;
use crate::eclass::collect_eclasses;
use crate::error::{Error, Result};
use crate::output::SpiderOutput;
use crate::overlay::locate_overlays;
use crate::profile::{collect_profiles, read_parent_profiles};
use crate::shell::ShellEvaluator;
use crate::use_flags::{profile_use_flags, UseEvaluator};

/// Runs the discovery pipeline over a source tree.
///
/// Stages run strictly in order (boards, overlays, profiles, eclasses,
/// ebuilds, ebuild metadata, profile USE flags, profile parents) and the
/// first failing stage aborts the run. Per-item work inside the metadata and
/// USE stages is spread over a worker pool.
#[derive(Debug)]
pub struct Explorer<E = ShellEvaluator> {
    config: ExplorerConfig,
    evaluator: E,
}

impl Explorer<ShellEvaluator> {
    /// Explorer that evaluates `make.defaults` with the configured shell.
    pub fn new(config: ExplorerConfig) -> Result<Self> {
        let evaluator = ShellEvaluator::from_config(&config);
        Self::with_evaluator(config, evaluator)
    }
}

impl<E: UseEvaluator> Explorer<E> {
    /// Explorer with a custom USE evaluator.
    pub fn with_evaluator(config: ExplorerConfig, evaluator: E) -> Result<Self> {
        config.validate()?;
        Ok(Explorer { config, evaluator })
    }

    /// Settings of this explorer.
    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Explore the tree and assemble the result.
    pub fn run(&self) -> Result<SpiderOutput> {
        let root = self.config.source_root.as_path();
        let pool = self.thread_pool()?;

        let mut overlays = locate_overlays(&self.config)?;
        let mut build_targets = discover_build_targets(overlays.iter().map(|o| o.path.as_str()));
        info!("Stage boards: {} build targets", build_targets.len());
        info!("Stage overlays: {} overlays", overlays.len());

        for overlay in &mut overlays {
            overlay.profiles = collect_profiles(root, overlay)?;
        }
        let base_profiles = map_base_profiles(&overlays, self.config.private_base_policy)?;
        link_base_profiles(&mut build_targets, &base_profiles)?;
        info!(
            "Stage profiles: {} profiles",
            overlays.iter().map(|o| o.profiles.len()).sum::<usize>()
        );

        for overlay in &mut overlays {
            overlay.eclasses = collect_eclasses(root, overlay)?;
        }
        info!(
            "Stage eclasses: {} eclasses",
            overlays.iter().map(|o| o.eclasses.len()).sum::<usize>()
        );

        for overlay in &mut overlays {
            overlay.ebuilds = collect_ebuilds(root, overlay)?;
        }
        info!(
            "Stage ebuilds: {} ebuilds",
            overlays.iter().map(|o| o.ebuilds.len()).sum::<usize>()
        );

        pool.install(|| {
            overlays.par_iter_mut().try_for_each(|overlay| {
                let dir = overlay.dir(root);
                overlay
                    .ebuilds
                    .par_iter_mut()
                    .try_for_each(|ebuild| ebuild.load_metadata(&dir))
            })
        })?;
        info!("Stage ebuild metadata: done");

        let evaluator: &dyn UseEvaluator = &self.evaluator;
        let minus_star = self.config.minus_star;
        pool.install(|| {
            overlays.par_iter_mut().for_each(|overlay| {
                let dir = overlay.dir(root);
                overlay.profiles.par_iter_mut().for_each(|profile| {
                    profile.use_flags =
                        profile_use_flags(evaluator, &profile.dir(&dir), minus_star);
                });
            });
        });
        info!("Stage profile USE flags: done");

        for overlay in &mut overlays {
            let dir = overlay.dir(root);
            for profile in &mut overlay.profiles {
                profile.parent_profiles = read_parent_profiles(&profile.dir(&dir))?;
            }
        }
        info!("Stage profile parents: done");

        Ok(SpiderOutput {
            build_targets,
            overlays,
        })
    }

    fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = self.config.jobs {
            builder = builder.num_threads(jobs);
        }
        builder
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))
    }
}

/// Explore `config.source_root` using a shell to evaluate `make.defaults`.
pub fn explore(config: &ExplorerConfig) -> Result<SpiderOutput> {
    Explorer::new(config.clone())?.run()
}
