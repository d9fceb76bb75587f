//! Strategies for finding the market price text in a rendered page.
//!
//! Site layouts change; each strategy targets one layout revision and
//! the chain tries them in order until one applies. When all of them stop
//! matching, capture the page source, add a strategy or adjust the
//! settings in `LocatorConfig`, and add a fixture.

use crate::config::LocatorConfig;
use crate::error::TrackerError;
use scraper::{ElementRef, Html, Selector};
use tracing::trace;

/// Trait for one way of locating the price element.
pub trait PriceLocator: Send + Sync {
    /// Returns the price text, or `None` if this layout does not apply.
    fn locate(&self, document: &Html) -> Option<String>;

    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;
}

/// Price text found by a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub strategy: &'static str,
    pub text: String,
}

/// Collapses whitespace runs and trims.
fn normalized_text(element: ElementRef) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn parse_selector(css: &str) -> Result<Selector, TrackerError> {
    Selector::parse(css)
        .map_err(|e| TrackerError::Config(format!("invalid selector {:?}: {:?}", css, e)))
}

/// First element matching a fixed selector.
pub struct SelectorLocator {
    selector: Selector,
}

impl SelectorLocator {
    pub fn new(css: &str) -> Result<Self, TrackerError> {
        Ok(Self { selector: parse_selector(css)? })
    }
}

impl PriceLocator for SelectorLocator {
    fn locate(&self, document: &Html) -> Option<String> {
        document.select(&self.selector).map(normalized_text).find(|text| !text.is_empty())
    }

    fn name(&self) -> &'static str {
        "selector"
    }
}

/// Label with exact text (e.g. "Market Price"), value in its next sibling element.
pub struct LabelSiblingLocator {
    labels: Selector,
    label_text: String,
}

impl LabelSiblingLocator {
    pub fn new(label_css: &str, label_text: &str) -> Result<Self, TrackerError> {
        Ok(Self { labels: parse_selector(label_css)?, label_text: label_text.trim().to_string() })
    }

    fn is_label(&self, element: ElementRef) -> bool {
        let text = normalized_text(element);
        // "Market Price:" is rendered on some layouts
        text.trim_end_matches(':').trim_end() == self.label_text
    }
}

impl PriceLocator for LabelSiblingLocator {
    fn locate(&self, document: &Html) -> Option<String> {
        document.select(&self.labels).filter(|label| self.is_label(*label)).find_map(|label| {
            let sibling = label.next_siblings().find_map(ElementRef::wrap)?;
            let text = normalized_text(sibling);
            trace!("Label sibling text: {:?}", text);
            (!text.is_empty()).then_some(text)
        })
    }

    fn name(&self) -> &'static str {
        "label-sibling"
    }
}

/// Any element mentioning the needle, then a nearby element whose class hints at a value.
pub struct TextContainsLocator {
    needle: String,
    class_hints: Vec<String>,
    ancestor_depth: usize,
}

impl TextContainsLocator {
    pub fn new(needle: &str, class_hints: &[String]) -> Self {
        Self {
            needle: needle.to_lowercase(),
            class_hints: class_hints.iter().map(|h| h.to_lowercase()).collect(),
            ancestor_depth: 2,
        }
    }

    /// True if the element's own text nodes mention the needle.
    fn mentions_needle(&self, element: ElementRef) -> bool {
        let mut own = String::new();
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                own.push_str(text);
            }
        }
        own.to_lowercase().contains(&self.needle)
    }

    fn has_hinted_class(&self, element: ElementRef) -> bool {
        element.value().attr("class").is_some_and(|class| {
            let class = class.to_lowercase();
            self.class_hints.iter().any(|hint| class.contains(hint.as_str()))
        })
    }

    /// First hinted descendant of `scope` whose text contains a digit.
    fn value_within(&self, scope: ElementRef) -> Option<String> {
        scope
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| self.has_hinted_class(*el))
            .map(normalized_text)
            .find(|text| text.chars().any(|c| c.is_ascii_digit()))
    }
}

impl PriceLocator for TextContainsLocator {
    fn locate(&self, document: &Html) -> Option<String> {
        let root = document.root_element();

        for element in root.descendants().filter_map(ElementRef::wrap) {
            if !self.mentions_needle(element) {
                continue;
            }

            let mut scope = Some(element);
            for _ in 0..=self.ancestor_depth {
                let Some(current) = scope else {
                    break;
                };
                if let Some(text) = self.value_within(current) {
                    return Some(text);
                }
                scope = current.parent().and_then(ElementRef::wrap);
            }
        }

        None
    }

    fn name(&self) -> &'static str {
        "text-contains"
    }
}

/// Ordered locators; the first that applies wins.
pub struct LocatorChain {
    locators: Vec<Box<dyn PriceLocator>>,
}

impl LocatorChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self { locators: Vec::new() }
    }

    /// Adds a locator to the end of the chain.
    pub fn add(&mut self, locator: impl PriceLocator + 'static) -> &mut Self {
        self.locators.push(Box::new(locator));
        self
    }

    /// Builds the standard chain: selector, label sibling, text contains.
    pub fn from_config(config: &LocatorConfig) -> Result<Self, TrackerError> {
        let mut chain = Self::new();
        chain
            .add(SelectorLocator::new(&config.price_selector)?)
            .add(LabelSiblingLocator::new(&config.label_selector, &config.label_text)?)
            .add(TextContainsLocator::new(&config.text_needle, &config.value_class_hints));
        Ok(chain)
    }

    /// Runs the locators against a parsed document.
    pub fn locate(&self, document: &Html) -> Option<Located> {
        self.locators.iter().find_map(|locator| {
            let found = locator.locate(document);
            trace!("Locator {} -> {:?}", locator.name(), found);
            found.map(|text| Located { strategy: locator.name(), text })
        })
    }

    /// Parses page source and runs the locators.
    pub fn locate_html(&self, html: &str) -> Option<Located> {
        let document = Html::parse_document(html);
        self.locate(&document)
    }

    /// Returns the locator names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.locators.iter().map(|l| l.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }
}

impl Default for LocatorChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> LocatorChain {
        LocatorChain::from_config(&LocatorConfig::default()).unwrap()
    }

    #[test]
    fn test_chain_order() {
        assert_eq!(chain().names(), vec!["selector", "label-sibling", "text-contains"]);
        assert_eq!(chain().len(), 3);
        assert!(LocatorChain::new().is_empty());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = LocatorConfig { price_selector: "[[[".to_string(), ..LocatorConfig::default() };
        let err = LocatorChain::from_config(&config).err().unwrap();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[test]
    fn test_selector_match() {
        let html = r#"
            <div class="search-result">
                <span class="price-point--price">
                    $0.42
                </span>
            </div>
        "#;
        let found = chain().locate_html(html).unwrap();
        assert_eq!(found.strategy, "selector");
        assert_eq!(found.text, "$0.42");
    }

    #[test]
    fn test_selector_skips_empty_match() {
        let html = r#"
            <span class="price-point--price"></span>
            <span class="price-point--price">$3.10</span>
        "#;
        let locator = SelectorLocator::new(".price-point--price").unwrap();
        let document = Html::parse_document(html);
        assert_eq!(locator.locate(&document).as_deref(), Some("$3.10"));
    }

    #[test]
    fn test_label_sibling() {
        let html = r#"
            <section class="product-card__market-price">
                <span class="label">Listed Median</span><span>$9.99</span>
                <span class="label">Market Price</span>
                <span>$1,234.56</span>
            </section>
        "#;
        let found = chain().locate_html(html).unwrap();
        assert_eq!(found.strategy, "label-sibling");
        assert_eq!(found.text, "$1,234.56");
    }

    #[test]
    fn test_label_with_colon() {
        let html = r#"<div><dt>Market Price:</dt><dd>$5.00</dd></div>"#;
        let locator = LabelSiblingLocator::new("dt", "Market Price").unwrap();
        let document = Html::parse_document(html);
        assert_eq!(locator.locate(&document).as_deref(), Some("$5.00"));
    }

    #[test]
    fn test_label_requires_exact_text() {
        let html = r#"<div><span>Market Price History</span><span>$5.00</span></div>"#;
        let locator = LabelSiblingLocator::new("span", "Market Price").unwrap();
        let document = Html::parse_document(html);
        assert_eq!(locator.locate(&document), None);
    }

    #[test]
    fn test_text_contains_nested_value() {
        let html = r#"
            <div class="product-card__market">
                <p>Current MARKET PRICE for this printing</p>
                <div class="product-card__market-price--value">
                    <strong>$2.75</strong>
                </div>
            </div>
        "#;
        let found = chain().locate_html(html).unwrap();
        assert_eq!(found.strategy, "text-contains");
        assert_eq!(found.text, "$2.75");
    }

    #[test]
    fn test_text_contains_ignores_values_without_digits() {
        let html = r#"
            <div>
                <span class="market-price__label">Market price</span>
                <span class="market-price__value">-</span>
            </div>
        "#;
        let locator = TextContainsLocator::new("market price", &["price".to_string()]);
        let document = Html::parse_document(html);
        assert_eq!(locator.locate(&document), None);
    }

    #[test]
    fn test_text_contains_depth_limited() {
        // Value is four levels away from the label
        let html = r#"
            <div class="value">$8.00
                <div><div><div><span>market price</span></div></div></div>
            </div>
        "#;
        let locator = TextContainsLocator::new("market price", &["value".to_string()]);
        let document = Html::parse_document(html);
        assert_eq!(locator.locate(&document), None);
    }

    #[test]
    fn test_no_locator_applies() {
        let html = r#"<html><body><div class="loading">Loading results…</div></body></html>"#;
        assert_eq!(chain().locate_html(html), None);
    }

    #[test]
    fn test_first_strategy_wins() {
        let html = r#"
            <span class="price-point--price">$1.00</span>
            <span>Market Price</span><span>$2.00</span>
        "#;
        let found = chain().locate_html(html).unwrap();
        assert_eq!(found.strategy, "selector");
        assert_eq!(found.text, "$1.00");
    }
}
