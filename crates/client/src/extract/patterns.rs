//! Ordered regex strategies for pulling fields out of result text.

use regex::Regex;
use shelf_core::Error;

/// A named, compiled strategy.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: String,
    pub regex: Regex,
}

impl Pattern {
    /// Capture group 1 if the pattern has one, otherwise the whole match.
    fn capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        let caps = self.regex.captures(text)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }
}

/// Strategies tried in order; the first one that matches wins.
#[derive(Debug, Clone, Default)]
pub struct PatternList {
    patterns: Vec<Pattern>,
}

impl PatternList {
    /// Compile `sources` for the field `kind`. Fails on the first invalid regex.
    pub fn compile(kind: &str, sources: &[String]) -> Result<Self, Error> {
        let patterns = sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                let name = format!("{kind}#{i}");
                Regex::new(source)
                    .map(|regex| Pattern { name, regex })
                    .map_err(|e| Error::Extract(format!("invalid {kind} pattern {source:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// First capture over the ordered list, with the name of the strategy that produced it.
    pub fn first_match<'t>(&self, text: &'t str) -> Option<(&str, &'t str)> {
        self.patterns.iter().find_map(|p| p.capture(text).map(|value| (p.name.as_str(), value)))
    }
}
