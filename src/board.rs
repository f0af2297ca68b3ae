use std::sync::OnceLock;

use regex::Regex;

// `(?:^|[^\w-])` stands in for a negative lookbehind: `overlay-` only counts
// as a leading token, never inside a longer name like `chromeos-overlay-oak`.
const BOARD_PATTERN: &str = concat!(
    r"(?:^|[^\w-])overlay-(?P<private>[\w-]+)-private(?:$|/)",
    r"|(?:^|[^\w-])overlay-(?P<public>[\w-]+)",
);

fn board_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BOARD_PATTERN).expect("board pattern is a valid regex"))
}

/// Derive a board name from an overlay path.
///
/// Recognises `overlay-<board>` and `overlay-<board>-private` path
/// components. Returns an empty string when the path names no board.
///
/// # Examples
///
/// ```
/// use portage_explorer::board_name_from_path;
///
/// assert_eq!(board_name_from_path("src/overlays/overlay-brya"), "brya");
/// assert_eq!(board_name_from_path("overlay-elm-private"), "elm");
/// assert_eq!(board_name_from_path("chromeos-overlay-oak"), "");
/// ```
pub fn board_name_from_path(path: &str) -> String {
    board_regex()
        .captures(path)
        .and_then(|caps| caps.name("private").or_else(|| caps.name("public")))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_overlay() {
        assert_eq!(board_name_from_path("overlay-brya"), "brya");
        assert_eq!(board_name_from_path("src/overlays/overlay-brya"), "brya");
    }

    #[test]
    fn private_overlay() {
        assert_eq!(board_name_from_path("overlay-elm-private"), "elm");
        assert_eq!(
            board_name_from_path("src/private-overlays/overlay-elm-private"),
            "elm"
        );
    }

    #[test]
    fn hyphenated_board() {
        assert_eq!(board_name_from_path("overlay-amd64-generic"), "amd64-generic");
        assert_eq!(
            board_name_from_path("src/private-overlays/overlay-kevin-arc64-private"),
            "kevin-arc64"
        );
    }

    #[test]
    fn embedded_overlay_is_ignored() {
        assert_eq!(board_name_from_path("chromeos-overlay-oak"), "");
        assert_eq!(board_name_from_path("src/third_party/chromiumos-overlay"), "");
    }

    #[test]
    fn not_an_overlay() {
        assert_eq!(board_name_from_path("baseboard-asuka"), "");
        assert_eq!(board_name_from_path(""), "");
    }
}
