//! Ingredient extraction from product detail pages
//!
//! A detail page carries its ingredient data in one of three shapes:
//! a single-SKU JSON record, a list of SKU records, or (for an alternate vendor)
//! a free-text block following an `Ingredients` section. The shape is resolved
//! once into a `RawProductPayload`; each variant has its own extraction routine.
//!
//! Splitting on `", "` fragments parenthesised sub-ingredient lists
//! (`Fragrance (Limonene, Linalool)` becomes three entries). This is a known
//! limitation and is kept as-is.

use anyhow::Result;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;

use super::config::ParsingConfig;
use super::embedded_payload::EmbeddedPayload;
use super::error::{ExtractReason, ExtractResult};
use super::{compile_pattern, compile_selector};
use crate::domain::IngredientSet;

const ENTRY_SEPARATOR: &str = ", ";
const BULLET_PATTERN: &str = r"^-\s*(?P<label>[^:]*?)\s*:";
const HEADER_PATTERN: &str = r".?(?:In)?[Aa]ctive Ingredients?: ?";
const TITLE_PATTERN: &str = r"^ ?(?P<product>.*?) - (?P<brand>.*?) \|";
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "td", "section",
];

/// Ingredient data of one detail page, resolved to its shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawProductPayload {
    /// One ingredient description, possibly absent
    SingleSku { description: Option<String> },
    /// Ordered SKU records, each with its own optional description
    MultiSku { descriptions: Vec<Option<String>> },
    /// Plain text following the page's ingredient section
    FreeText { text: String },
}

/// Everything the harvest keeps from a detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedProduct {
    pub ingredients: IngredientSet,
    pub brand: Option<String>,
}

pub struct IngredientExtractor {
    payload: EmbeddedPayload,
    free_text_selector: Selector,
    title_selector: Selector,
    bullet: Regex,
    header: Regex,
    title: Regex,
    product_pointer: String,
    single_sku_key: String,
    multi_sku_key: String,
    ingredient_field: String,
    brand_pointer: String,
}

impl IngredientExtractor {
    pub fn new() -> Result<Self> {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> Result<Self> {
        Ok(Self {
            payload: EmbeddedPayload::new(&config.payload_selector)?,
            free_text_selector: compile_selector(&format!("#{}", config.free_text_section_id))?,
            title_selector: compile_selector("title")?,
            bullet: compile_pattern("bullet", BULLET_PATTERN)?,
            header: compile_pattern("header", HEADER_PATTERN)?,
            title: compile_pattern("title", TITLE_PATTERN)?,
            product_pointer: config.product_pointer.clone(),
            single_sku_key: config.single_sku_key.clone(),
            multi_sku_key: config.multi_sku_key.clone(),
            ingredient_field: config.ingredient_field.clone(),
            brand_pointer: config.brand_pointer.clone(),
        })
    }

    /// Canonical ingredient set of a detail page.
    pub fn extract(&self, html: &str) -> ExtractResult<IngredientSet> {
        let document = Html::parse_document(html);
        let payload = self.resolve(&document)?;
        Ok(self.extract_payload(&payload))
    }

    /// Ingredients and brand from a single parse of the page.
    pub fn extract_product(&self, html: &str) -> ExtractResult<ExtractedProduct> {
        let document = Html::parse_document(html);
        let payload = self.resolve(&document)?;
        Ok(ExtractedProduct {
            ingredients: self.extract_payload(&payload),
            brand: self.brand_of(&document),
        })
    }

    /// Brand display name, from the JSON document or else the page title.
    pub fn extract_brand(&self, html: &str) -> Option<String> {
        self.brand_of(&Html::parse_document(html))
    }

    /// Determine which shape the page uses.
    ///
    /// The single-SKU key wins when both keys are present. Pages without a
    /// JSON document fall back to the free-text section.
    pub fn resolve(&self, document: &Html) -> ExtractResult<RawProductPayload> {
        let value = self
            .payload
            .read(document)
            .map_err(|e| ExtractReason::InvalidPayload(e.to_string()))?;

        let Some(value) = value else {
            return self
                .free_text(document)
                .map(|text| RawProductPayload::FreeText { text })
                .ok_or_else(|| ExtractReason::MissingPayload.into());
        };

        let product = value
            .pointer(&self.product_pointer)
            .and_then(Value::as_object)
            .ok_or(ExtractReason::UnknownShape)?;

        if let Some(sku) = product.get(&self.single_sku_key) {
            return Ok(RawProductPayload::SingleSku {
                description: self.description_of(sku),
            });
        }

        match product.get(&self.multi_sku_key).and_then(Value::as_array) {
            Some(skus) => Ok(RawProductPayload::MultiSku {
                descriptions: skus.iter().map(|sku| self.description_of(sku)).collect(),
            }),
            None => Err(ExtractReason::UnknownShape.into()),
        }
    }

    /// Shape-specific extraction behind one entry point.
    pub fn extract_payload(&self, payload: &RawProductPayload) -> IngredientSet {
        match payload {
            RawProductPayload::SingleSku { description } => {
                self.from_descriptions(std::iter::once(description))
            }
            RawProductPayload::MultiSku { descriptions } => self.from_descriptions(descriptions),
            RawProductPayload::FreeText { text } => self.from_free_text(text),
        }
    }

    /// Flatten every SKU's entries into one set. Absent descriptions contribute nothing.
    fn from_descriptions<'a>(
        &self,
        descriptions: impl IntoIterator<Item = &'a Option<String>>,
    ) -> IngredientSet {
        descriptions
            .into_iter()
            .flatten()
            .flat_map(|markup| {
                strip_markup(markup)
                    .split(ENTRY_SEPARATOR)
                    .filter(|entry| !entry.trim().is_empty())
                    .map(|entry| self.normalize_entry(entry))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn from_free_text(&self, text: &str) -> IngredientSet {
        self.remove_headers(text)
            .split(ENTRY_SEPARATOR)
            .filter(|entry| !entry.is_empty())
            .map(|entry| self.normalize_entry(entry))
            .collect()
    }

    /// Trim, then reduce a `-<label>: description` bullet to its label.
    pub fn normalize_entry(&self, entry: &str) -> String {
        let trimmed = entry.trim();
        match self.bullet.captures(trimmed) {
            Some(captures) => captures["label"].trim().to_string(),
            None => trimmed.to_string(),
        }
    }

    /// Replace `Active Ingredient:` / `Inactive Ingredients:` headers with a separator.
    pub fn remove_headers(&self, text: &str) -> String {
        self.header.replace_all(text, ENTRY_SEPARATOR).into_owned()
    }

    fn description_of(&self, sku: &Value) -> Option<String> {
        sku.get(&self.ingredient_field)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Text of the first non-empty sibling after the ingredient section marker.
    fn free_text(&self, document: &Html) -> Option<String> {
        let section = document.select(&self.free_text_selector).next()?;
        section.next_siblings().find_map(|sibling| {
            let text = match sibling.value() {
                Node::Text(text) => text.to_string(),
                Node::Element(_) => plain_text(ElementRef::wrap(sibling)?),
                _ => return None,
            };
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
    }

    fn brand_of(&self, document: &Html) -> Option<String> {
        let from_payload = self
            .payload
            .read(document)
            .ok()
            .flatten()
            .and_then(|value| {
                value
                    .pointer(&format!("{}{}", self.product_pointer, self.brand_pointer))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });

        from_payload
            .or_else(|| {
                let title = document
                    .select(&self.title_selector)
                    .next()?
                    .text()
                    .collect::<String>();
                self.title
                    .captures(&title)
                    .map(|captures| captures["brand"].to_string())
            })
            .map(|brand| brand.trim().to_string())
            .filter(|brand| !brand.is_empty())
    }
}

/// Plain text of an HTML fragment.
///
/// Line breaks and block boundaries become entry separators, so text on either
/// side of a `<br>` never runs together.
pub fn strip_markup(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    plain_text(fragment.root_element())
}

fn plain_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    collect_text(element, &mut text);
    text.trim_end_matches(ENTRY_SEPARATOR).trim().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(tag) if tag.name() == "br" => push_boundary(out),
            Node::Element(tag) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_ELEMENTS.contains(&tag.name());
                if block {
                    push_boundary(out);
                }
                collect_text(child, out);
                if block {
                    push_boundary(out);
                }
            }
            _ => {}
        }
    }
}

fn push_boundary(out: &mut String) {
    let content = out.trim_end().len();
    if content > 0 && !out[..content].ends_with(',') {
        out.truncate(content);
        out.push_str(ENTRY_SEPARATOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn extractor() -> IngredientExtractor {
        IngredientExtractor::new().unwrap()
    }

    fn product_page(product_json: &str) -> String {
        format!(
            r#"<html><head><title>Night Cream | Shop</title></head><body>
                <script id="linkStore" type="text/json">{{"page": {{"product": {product_json}}}}}</script>
            </body></html>"#
        )
    }

    fn names(set: &IngredientSet) -> Vec<String> {
        set.to_vec()
    }

    #[rstest]
    #[case("-Shea Butter: moisturizing agent", "Shea Butter")]
    #[case("  Water  ", "Water")]
    #[case("- Squalane : lightweight oil", "Squalane")]
    #[case("Vitamin C-Ester", "Vitamin C-Ester")]
    fn test_normalize_entry(#[case] entry: &str, #[case] expected: &str) {
        assert_eq!(extractor().normalize_entry(entry), expected);
    }

    #[test]
    fn test_single_sku_shape() {
        let html = product_page(
            r#"{"currentSku": {"ingredientDesc": "<p>Water, Glycerin, <b>Niacinamide</b></p>"}}"#,
        );
        let extractor = extractor();
        let document = Html::parse_document(&html);

        assert!(matches!(
            extractor.resolve(&document).unwrap(),
            RawProductPayload::SingleSku { description: Some(_) }
        ));
        assert_eq!(
            names(&extractor.extract(&html).unwrap()),
            vec!["Glycerin", "Niacinamide", "Water"]
        );
    }

    #[test]
    fn test_multi_sku_shape_flattens_and_deduplicates() {
        let html = product_page(
            r#"{"regularChildSkus": [
                {"ingredientDesc": "Water, Shea Butter"},
                {"skuId": "2"},
                {"ingredientDesc": "<p>-Squalane: plant derived</p>, Water"}
            ]}"#,
        );
        let extractor = extractor();
        let document = Html::parse_document(&html);

        match extractor.resolve(&document).unwrap() {
            RawProductPayload::MultiSku { descriptions } => {
                assert_eq!(descriptions.len(), 3);
                assert!(descriptions[1].is_none());
            }
            other => panic!("expected multi-SKU payload, got {other:?}"),
        }
        assert_eq!(
            names(&extractor.extract(&html).unwrap()),
            vec!["Shea Butter", "Squalane", "Water"]
        );
    }

    #[test]
    fn test_single_sku_key_takes_precedence() {
        let html = product_page(
            r#"{"currentSku": {"ingredientDesc": "Retinol"},
                "regularChildSkus": [{"ingredientDesc": "Water"}]}"#,
        );
        assert_eq!(names(&extractor().extract(&html).unwrap()), vec!["Retinol"]);
    }

    #[test]
    fn test_sku_without_description_yields_empty_set() {
        let html = product_page(r#"{"currentSku": {"skuId": "1"}}"#);
        assert!(extractor().extract(&html).unwrap().is_empty());
    }

    #[rstest]
    #[case(r#"{"displayName": "Cream"}"#)]
    #[case(r#"{"regularChildSkus": "not a list"}"#)]
    #[case(r#""just a string""#)]
    fn test_unknown_shape(#[case] product_json: &str) {
        let err = extractor().extract(&product_page(product_json)).unwrap_err();
        assert_eq!(err.reason, ExtractReason::UnknownShape);
    }

    #[test]
    fn test_missing_payload() {
        let err = extractor()
            .extract("<html><body><p>Nothing to see</p></body></html>")
            .unwrap_err();
        assert_eq!(err.reason, ExtractReason::MissingPayload);
        assert_eq!(err.to_string(), "Ingredient extraction failed: missing payload");
    }

    #[test]
    fn test_invalid_payload() {
        let err = extractor()
            .extract(r#"<script id="linkStore">{"page": [</script>"#)
            .unwrap_err();
        assert!(matches!(err.reason, ExtractReason::InvalidPayload(_)));
    }

    #[test]
    fn test_header_stripping() {
        let set = extractor().from_free_text(
            "Active Ingredient: Colloidal Oatmeal 0.50%.Inactive Ingredients: Water, Glycerin",
        );
        assert_eq!(names(&set), vec!["Colloidal Oatmeal 0.50%", "Glycerin", "Water"]);
    }

    #[test]
    fn test_free_text_page() {
        let html = r#"<html><head><title>Ultra Repair Cream - First Aid Beauty | Ulta Beauty</title></head>
            <body>
              <h2 id="Ingredients">Ingredients</h2>
              <div>Active Ingredient: Colloidal Oatmeal 0.50%.Inactive Ingredients: Water, Stearic Acid, Butyrospermum Parkii (Shea) Butter, Eucalyptus Globulus Leaf Oil.</div>
            </body></html>"#;

        let product = extractor().extract_product(html).unwrap();
        assert_eq!(
            names(&product.ingredients),
            vec![
                "Butyrospermum Parkii (Shea) Butter",
                "Colloidal Oatmeal 0.50%",
                "Eucalyptus Globulus Leaf Oil.",
                "Stearic Acid",
                "Water",
            ]
        );
        assert_eq!(product.brand.as_deref(), Some("First Aid Beauty"));
    }

    #[test]
    fn test_parenthesised_lists_fragment() {
        let html = product_page(r#"{"currentSku": {"ingredientDesc": "Fragrance (Limonene, Linalool)"}}"#);
        assert_eq!(
            names(&extractor().extract(&html).unwrap()),
            vec!["Fragrance (Limonene", "Linalool)"]
        );
    }

    #[test]
    fn test_brand_from_payload() {
        let html = product_page(
            r#"{"productDetails": {"brand": {"displayName": "fresh"}},
                "currentSku": {"ingredientDesc": "Water"}}"#,
        );
        assert_eq!(extractor().extract_brand(&html).as_deref(), Some("fresh"));
    }

    #[test]
    fn test_brand_absent() {
        let html = product_page(r#"{"currentSku": {}}"#);
        assert_eq!(extractor().extract_brand(&html), None);
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<p>Water, <span>Glycerin</span></p>"), "Water, Glycerin");
        assert_eq!(strip_markup("no markup"), "no markup");
        assert_eq!(strip_markup("<p>Water</p><p>Glycerin</p>"), "Water, Glycerin");
    }

    #[test]
    fn test_line_break_separates_entries() {
        assert_eq!(
            strip_markup("<p>-Niacinamide: brightens<br>Water, Glycerin</p>"),
            "-Niacinamide: brightens, Water, Glycerin"
        );

        let payload = RawProductPayload::SingleSku {
            description: Some("<p>-Niacinamide: brightens<br>Water, Glycerin</p>".to_string()),
        };
        assert_eq!(
            names(&extractor().extract_payload(&payload)),
            vec!["Glycerin", "Niacinamide", "Water"]
        );
    }

    proptest! {
        #[test]
        fn prop_members_are_trimmed_and_non_empty(
            entries in prop::collection::vec(" ?(-[A-Za-z][A-Za-z ]{0,12}: [a-z]{1,8}|[A-Za-z][A-Za-z ]{0,12})", 0..12)
        ) {
            let payload = RawProductPayload::SingleSku { description: Some(entries.join(", ")) };
            let set = extractor().extract_payload(&payload);
            for name in set.iter() {
                prop_assert!(!name.is_empty());
                prop_assert_eq!(name.trim(), name);
                prop_assert!(!name.starts_with('-'));
            }
        }

        #[test]
        fn prop_extraction_is_order_independent(
            entries in prop::collection::vec("[A-Za-z][A-Za-z0-9 ]{0,10}", 1..10)
        ) {
            let extractor = extractor();
            let forward = RawProductPayload::MultiSku {
                descriptions: entries.iter().map(|e| Some(e.clone())).collect(),
            };
            let reversed = RawProductPayload::MultiSku {
                descriptions: entries.iter().rev().map(|e| Some(e.clone())).collect(),
            };
            prop_assert_eq!(extractor.extract_payload(&forward), extractor.extract_payload(&reversed));
        }
    }
}
