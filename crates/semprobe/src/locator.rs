//! Locator expressions and ordered candidate lists.
//!
//! The semantics overlay exposes one logical control under several attribute
//! schemes, so a control is addressed by an ordered list of [`Selector`]s
//! rather than a single exact selector. The first actionable candidate wins.
//!
//! Field candidates are produced by [`FieldStrategies`], an ordered list of
//! pure functions mapping a logical field name to a concrete selector.

use std::fmt;

/// Attribute carrying the accessible label of a semantics node
pub const SEMANTICS_LABEL_ATTR: &str = "data-semantics-label";

/// Attribute carrying the widget role of a semantics node
pub const SEMANTICS_ROLE_ATTR: &str = "data-semantics-role";

/// Maximum distance in CSS pixels for a proximity match
pub const NEAR_DISTANCE_PX: u32 = 50;

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector (e.g., `button[type="submit"]`)
    Css(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// Innermost element whose text contains the value
    Text(String),
    /// CSS selector filtered by case-insensitive text containment
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// Semantics node whose label contains the value, case-insensitive
    SemanticsLabel(String),
    /// Element of a CSS kind closest to a text anchor
    Near {
        /// CSS selector of the wanted element
        css: String,
        /// Text of the anchor element
        text: String,
    },
    /// The n-th (zero-based) match of an inner selector
    Nth {
        /// Inner selector
        inner: Box<Selector>,
        /// Zero-based index
        index: usize,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a CSS selector filtered by text (`css:has-text("text")`)
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Create a semantics-label containment selector
    #[must_use]
    pub fn semantics_label(label: impl Into<String>) -> Self {
        Self::SemanticsLabel(label.into())
    }

    /// Create a proximity selector (`css:near(:text("text"))`)
    #[must_use]
    pub fn near(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Near {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Select the n-th match of this selector
    #[must_use]
    pub fn nth(self, index: usize) -> Self {
        Self::Nth {
            inner: Box::new(self),
            index,
        }
    }

    /// Convert to a JavaScript expression evaluating to an array of all matches
    #[must_use]
    pub fn to_all_query(&self) -> String {
        match self {
            Self::Css(s) => css_all(s),
            Self::TestId(id) => css_all(&attr_equals("data-testid", id)),
            Self::SemanticsLabel(label) => css_all(&attr_contains(SEMANTICS_LABEL_ATTR, label)),
            Self::Text(t) => {
                let t = js_str(t);
                format!(
                    "Array.from(document.querySelectorAll('body *')).filter(el => \
                     (el.textContent || '').includes({t}) && \
                     !Array.from(el.children).some(c => (c.textContent || '').includes({t})))"
                )
            }
            Self::CssWithText { css, text } => {
                format!(
                    "Array.from(document.querySelectorAll({})).filter(el => \
                     (el.textContent || '').toLowerCase().includes({}.toLowerCase()))",
                    js_str(css),
                    js_str(text)
                )
            }
            Self::Near { css, text } => {
                format!(
                    "(() => {{ \
                     const anchors = Array.from(document.querySelectorAll('body *')).filter(el => \
                       el.children.length === 0 && (el.textContent || '').includes({text})); \
                     const gap = (a, b) => {{ \
                       const r1 = a.getBoundingClientRect(); const r2 = b.getBoundingClientRect(); \
                       const dx = Math.max(0, r1.left - r2.right, r2.left - r1.right); \
                       const dy = Math.max(0, r1.top - r2.bottom, r2.top - r1.bottom); \
                       return Math.hypot(dx, dy); }}; \
                     return Array.from(document.querySelectorAll({css})) \
                       .map(el => [el, Math.min(Infinity, ...anchors.map(a => gap(el, a)))]) \
                       .filter(([, d]) => d <= {NEAR_DISTANCE_PX}) \
                       .sort((a, b) => a[1] - b[1]) \
                       .map(([el]) => el); }})()",
                    text = js_str(text),
                    css = js_str(css)
                )
            }
            Self::Nth { inner, index } => {
                format!("[({})[{index}]].filter(Boolean)", inner.to_all_query())
            }
        }
    }

    /// Convert to a JavaScript expression evaluating to the first match or `undefined`
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("({})[0]", self.to_all_query())
    }

    /// Convert to a JavaScript expression counting matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("({}).length", self.to_all_query())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::Text(t) => write!(f, "text={t}"),
            Self::CssWithText { css, text } => write!(f, "{css}:has-text(\"{text}\")"),
            Self::SemanticsLabel(label) => write!(f, "semantics={label}"),
            Self::Near { css, text } => write!(f, "{css}:near(:text(\"{text}\"))"),
            Self::Nth { inner, index } => write!(f, "{inner} >> nth={index}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(css: &str) -> Self {
        Self::Css(css.to_string())
    }
}

impl From<String> for Selector {
    fn from(css: String) -> Self {
        Self::Css(css)
    }
}

/// Escape a value for use inside a double-quoted CSS attribute selector
#[must_use]
pub fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `[attr="value"]`
#[must_use]
pub fn attr_equals(attr: &str, value: &str) -> String {
    format!("[{attr}=\"{}\"]", css_escape(value))
}

/// `[attr*="value" i]`
#[must_use]
pub fn attr_contains(attr: &str, value: &str) -> String {
    format!("[{attr}*=\"{}\" i]", css_escape(value))
}

fn css_all(css: &str) -> String {
    format!("Array.from(document.querySelectorAll({}))", js_str(css))
}

pub(crate) fn js_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Ordered list of locator candidates for one logical control
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates(Vec<Selector>);

impl Candidates {
    /// Create an empty candidate list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate with lower priority than all existing ones
    #[must_use]
    pub fn with(mut self, selector: impl Into<Selector>) -> Self {
        self.0.push(selector.into());
        self
    }

    /// Append a candidate in place
    pub fn push(&mut self, selector: impl Into<Selector>) {
        self.0.push(selector.into());
    }

    /// Iterate candidates in priority order
    pub fn iter(&self) -> std::slice::Iter<'_, Selector> {
        self.0.iter()
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Candidate at a position
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Selector> {
        self.0.get(index)
    }
}

impl From<Vec<Selector>> for Candidates {
    fn from(selectors: Vec<Selector>) -> Self {
        Self(selectors)
    }
}

impl From<Selector> for Candidates {
    fn from(selector: Selector) -> Self {
        Self(vec![selector])
    }
}

impl FromIterator<Selector> for Candidates {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Candidates {
    type Item = &'a Selector;
    type IntoIter = std::slice::Iter<'a, Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A pure function deriving one locator for a logical field name
pub type FieldStrategy = fn(&str) -> Selector;

/// Exact `name` attribute
#[must_use]
pub fn by_name(field: &str) -> Selector {
    Selector::Css(attr_equals("name", field))
}

/// Exact test id
#[must_use]
pub fn by_test_id(field: &str) -> Selector {
    Selector::test_id(field)
}

/// Case-insensitive `aria-label` containment
#[must_use]
pub fn by_aria_label(field: &str) -> Selector {
    Selector::Css(attr_contains("aria-label", field))
}

/// Case-insensitive `placeholder` containment
#[must_use]
pub fn by_placeholder(field: &str) -> Selector {
    Selector::Css(attr_contains("placeholder", field))
}

/// Case-insensitive semantics-label containment
#[must_use]
pub fn by_semantics_label(field: &str) -> Selector {
    Selector::semantics_label(field)
}

/// Input closest to a text node naming the field
#[must_use]
pub fn by_proximity(field: &str) -> Selector {
    Selector::near("input", field)
}

/// Ordered list of named field strategies
#[derive(Debug, Clone)]
pub struct FieldStrategies {
    strategies: Vec<(&'static str, FieldStrategy)>,
}

impl Default for FieldStrategies {
    fn default() -> Self {
        Self {
            strategies: vec![
                ("name", by_name),
                ("test-id", by_test_id),
                ("aria-label", by_aria_label),
                ("placeholder", by_placeholder),
                ("semantics-label", by_semantics_label),
                ("proximity", by_proximity),
            ],
        }
    }
}

impl FieldStrategies {
    /// Same strategies, semantics label tried first.
    ///
    /// Pages rendered entirely into the overlay never carry `name` or test ids,
    /// so probing those first only burns probe timeouts.
    #[must_use]
    pub fn semantics_first() -> Self {
        Self {
            strategies: vec![
                ("semantics-label", by_semantics_label),
                ("aria-label", by_aria_label),
                ("placeholder", by_placeholder),
                ("name", by_name),
                ("test-id", by_test_id),
                ("proximity", by_proximity),
            ],
        }
    }

    /// Build from an explicit list
    #[must_use]
    pub fn from_list(strategies: Vec<(&'static str, FieldStrategy)>) -> Self {
        Self { strategies }
    }

    /// Strategy names in evaluation order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(name, _)| *name).collect()
    }

    /// Derive the ordered candidates for a field
    #[must_use]
    pub fn candidates_for(&self, field: &str) -> Candidates {
        self.strategies.iter().map(|(_, f)| f(field)).collect()
    }
}
