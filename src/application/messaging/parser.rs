//! Prefix and alias matching for text messages

use super::registry::LoadedCommand;

/// Code points accepted between an alias and its arguments
const SEPARATORS: &[char] = &[
    '\u{0009}', '\u{000A}', '\u{000B}', '\u{000C}', '\u{000D}', '\u{0020}', '\u{0085}', '\u{00A0}',
    '\u{1680}', '\u{2000}', '\u{2001}', '\u{2002}', '\u{2003}', '\u{2004}', '\u{2005}', '\u{2006}',
    '\u{2007}', '\u{2008}', '\u{2009}', '\u{200A}', '\u{2028}', '\u{2029}', '\u{202F}', '\u{205F}',
    '\u{3000}',
];

pub fn is_separator(c: char) -> bool {
    SEPARATORS.contains(&c)
}

/// Result of matching a message against prefixes and aliases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch {
    /// Position of the command in the slice that was searched
    pub index: usize,
    pub prefix: String,
    pub alias: String,
    /// Text after the alias and one separator, left-trimmed
    pub content: String,
}

/// Match `text` against `prefixes` and `commands`.
///
/// Prefixes are tried from last to first. Commands are tried in slice order,
/// which is descending priority, and each command's aliases from last to
/// first. A structural match only counts if `accept` approves the command.
/// The first accepted match wins.
pub fn match_text(
    text: &str,
    prefixes: &[String],
    commands: &[LoadedCommand],
    mut accept: impl FnMut(&LoadedCommand) -> bool,
) -> Option<TextMatch> {
    let text = text.trim();

    for prefix in prefixes.iter().rev() {
        if prefix.is_empty() {
            continue;
        }
        let Some(rest) = text.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let rest = rest.trim_start();

        for (index, command) in commands.iter().enumerate() {
            for alias in command.aliases.iter().rev() {
                let Some(after) = strip_alias(rest, alias) else {
                    continue;
                };
                if !accept(command) {
                    continue;
                }
                return Some(TextMatch {
                    index,
                    prefix: prefix.clone(),
                    alias: alias.clone(),
                    content: after.trim_start().to_string(),
                });
            }
        }
    }
    None
}

/// Case-insensitively strip `alias` from the start of `text`, requiring the
/// alias to end the text or be followed by a separator, which is consumed.
pub fn strip_alias<'t>(text: &'t str, alias: &str) -> Option<&'t str> {
    let mut chars = text.chars();
    for expected in alias.chars() {
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }

    let rest = chars.as_str();
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if is_separator(c) => Some(&rest[c.len_utf8()..]),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::messaging::registry::tests::stub;
    use crate::application::messaging::CommandRegistry;

    fn prefixes(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn registry(commands: &[(&str, &[&str], i32)]) -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        for (name, aliases, priority) in commands {
            registry.register(*name, stub(aliases, *priority)).unwrap();
        }
        registry.sort();
        registry.validate_aliases();
        registry
    }

    fn matched(text: &str, prefixes: &[String], registry: &CommandRegistry) -> Option<(String, String)> {
        match_text(text, prefixes, registry.all(), |_| true)
            .map(|m| (registry.all()[m.index].name.clone(), m.content))
    }

    #[test]
    fn test_alias_requires_separator_boundary() {
        let registry = registry(&[("ping", &["ping"], 4), ("ping2", &["ping2"], 0)]);
        let prefixes = prefixes(&["!", "twink!"]);

        assert_eq!(matched("!ping2", &prefixes, &registry), Some(("ping2".into(), "".into())));
        assert_eq!(matched("!ping", &prefixes, &registry), Some(("ping".into(), "".into())));
        assert_eq!(matched("!pingu", &prefixes, &registry), None);
        assert_eq!(matched("twink!ping", &prefixes, &registry), Some(("ping".into(), "".into())));
    }

    #[test]
    fn test_content_follows_alias() {
        let registry = registry(&[("help", &["help", "h"], 0), ("ping", &["ping"], 0)]);
        let prefixes = prefixes(&["!"]);

        assert_eq!(matched("  !help ping  ", &prefixes, &registry), Some(("help".into(), "ping".into())));
        assert_eq!(matched("! HELP   ping", &prefixes, &registry), Some(("help".into(), "ping".into())));
        assert_eq!(matched("!h\u{3000}ping", &prefixes, &registry), Some(("help".into(), "ping".into())));
        assert_eq!(matched("help ping", &prefixes, &registry), None);
    }

    #[test]
    fn test_later_prefix_shadows_earlier() {
        let registry = registry(&[("ping", &["ping"], 0), ("bang", &["!ping"], 0)]);

        // "!!" is registered last, so it is tried before "!"
        let m = match_text("!!ping", &prefixes(&["!", "!!"]), registry.all(), |_| true).unwrap();
        assert_eq!(m.prefix, "!!");
        assert_eq!(registry.all()[m.index].name, "ping");

        let m = match_text("!!ping", &prefixes(&["!!", "!"]), registry.all(), |_| true).unwrap();
        assert_eq!(m.prefix, "!");
        assert_eq!(registry.all()[m.index].name, "bang");
    }

    #[test]
    fn test_last_declared_alias_is_tried_first() {
        let registry = registry(&[("tag", &["t", "tag"], 0)]);
        let m = match_text("!tag x", &prefixes(&["!"]), registry.all(), |_| true).unwrap();
        assert_eq!(m.alias, "tag");
        assert_eq!(m.content, "x");
    }

    #[test]
    fn test_higher_priority_wins_and_rejection_falls_through() {
        let registry = registry(&[("user", &["config"], 0), ("owner", &["config"], 4)]);
        let prefixes = prefixes(&["!"]);

        assert_eq!(matched("!config", &prefixes, &registry).unwrap().0, "owner");

        let m = match_text("!config", &prefixes, registry.all(), |c| c.name != "owner").unwrap();
        assert_eq!(registry.all()[m.index].name, "user");
    }

    #[test]
    fn test_strip_alias() {
        assert_eq!(strip_alias("ping", "ping"), Some(""));
        assert_eq!(strip_alias("PiNg  a", "ping"), Some(" a"));
        assert_eq!(strip_alias("pin", "ping"), None);
        assert_eq!(strip_alias("pinged", "ping"), None);
        assert_eq!(strip_alias("ping\u{00A0}x", "ping"), Some("x"));
    }
}
