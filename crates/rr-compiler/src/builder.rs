use rr_core::RuleSnapshot;

use crate::parser::{parse_rules, ParseContext};

/// A piece of rule text and whether it is a root document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub text: String,
    pub root: bool,
}

impl Source {
    pub fn root(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            root: true,
        }
    }

    pub fn fragment(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            root: false,
        }
    }
}

/// Compile sources in order into a fresh snapshot. Earlier sources take
/// priority within each category.
pub fn build_snapshot<'s, I>(sources: I, ctx: &ParseContext<'_>) -> RuleSnapshot
where
    I: IntoIterator<Item = &'s Source>,
{
    let mut snapshot = RuleSnapshot::new(ctx.protocols.clone());
    for source in sources {
        snapshot.extend(parse_rules(&source.text, source.root, ctx));
    }
    log::debug!("built snapshot with {} rules", snapshot.len());
    snapshot
}

/// Copy of `base` with the rules of `source` appended. `base` is untouched.
pub fn extend_snapshot(base: &RuleSnapshot, source: &Source, ctx: &ParseContext<'_>) -> RuleSnapshot {
    let mut snapshot = base.clone();
    snapshot.extend(parse_rules(&source.text, source.root, ctx));
    snapshot
}

#[cfg(test)]
mod tests {
    use rr_core::protocols::{HOST, PROXY, RULE};
    use rr_core::{match_rule, EmptyValues, Protocols, ValueScope};

    use super::*;

    #[test]
    fn builds_category_buckets() {
        let protocols = Protocols::default();
        let ctx = ParseContext::new(&protocols);
        let sources = [
            Source::root("a.com 1.1.1.1\na.com proxy://p1"),
            Source::fragment("a.com 2.2.2.2\nb.com http://c.com"),
        ];
        let snapshot = build_snapshot(&sources, &ctx);

        assert_eq!(snapshot.rules(HOST).len(), 2);
        assert_eq!(snapshot.rules(PROXY).len(), 1);
        assert_eq!(snapshot.rules(RULE).len(), 1);
        assert!(snapshot.rules(HOST)[0].is_root());
        assert!(!snapshot.rules(HOST)[1].is_root());

        let mut scope = ValueScope::new(&EmptyValues);
        let host = match_rule("http://a.com/x", snapshot.rules(HOST), &mut scope, 0).unwrap();
        assert_eq!(host.matcher, "host://1.1.1.1");
    }

    #[test]
    fn extend_leaves_base_alone() {
        let protocols = Protocols::default();
        let ctx = ParseContext::new(&protocols);
        let base = build_snapshot(&[Source::root("a.com 1.1.1.1")], &ctx);
        let next = extend_snapshot(&base, &Source::fragment("b.com 2.2.2.2"), &ctx);
        assert_eq!(base.len(), 1);
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn registered_protocols_get_buckets() {
        let mut protocols = Protocols::default();
        protocols.register("mock");
        let ctx = ParseContext::new(&protocols);
        let snapshot = build_snapshot(&[Source::root("a.com mock://x")], &ctx);
        assert_eq!(snapshot.rules("mock").len(), 1);
        assert!(snapshot.rules(RULE).is_empty());
    }
}
