//! Extraction of item rows and media references from storefront views.
//!
//! `scraper::Html` is not `Send`, so every function here parses and returns
//! owned data before the caller awaits again.

use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};

struct Selectors {
    listing_images: Selector,
    order_info: Selector,
    checkout_image: Selector,
    detail_image: Selector,
    history_rows: Selector,
    row_item_id: Selector,
    row_quantity: Selector,
    row_image: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        // SAFETY: hardcoded selectors that always parse
        let parse = |css: &str| Selector::parse(css).expect("static selector is valid");
        Selectors {
            listing_images: parse("div.content-container img.card-img-top.products-img"),
            order_info: parse("div.content-container p.card-text"),
            checkout_image: parse("div.content-container img.checkout-img"),
            detail_image: parse("div.content-container img.product-img"),
            history_rows: parse("tr"),
            row_item_id: parse("td.product_id"),
            row_quantity: parse("td.product_quantity"),
            row_image: parse("td.product_image img"),
        }
    })
}

/// Purchase confirmation view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub order_info: String,
    pub image_src: Option<String>,
}

impl Confirmation {
    /// True when the order text mirrors `quantity` as "<quantity> x".
    pub fn mirrors_quantity(&self, quantity: u32) -> bool {
        let expected = quantity.to_string();
        let tokens: Vec<&str> = self.order_info.split_whitespace().collect();
        tokens
            .windows(2)
            .any(|w| w[0] == expected && w[1] == "x")
    }
}

/// Media references of every item card on the listing view, in page order.
pub fn listing_images(body: &str) -> Vec<String> {
    let doc = Html::parse_document(body);
    doc.select(&selectors().listing_images)
        .filter_map(|img| img.value().attr("src"))
        .map(str::to_string)
        .collect()
}

pub fn confirmation(body: &str) -> Confirmation {
    let doc = Html::parse_document(body);
    let s = selectors();
    let order_info = doc
        .select(&s.order_info)
        .map(|p| text_of(&p))
        .collect::<Vec<_>>()
        .join(" ");
    Confirmation {
        order_info,
        image_src: first_src(doc.select(&s.checkout_image)),
    }
}

pub fn detail_image(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    first_src(doc.select(&selectors().detail_image))
}

/// Media reference of the first history row matching `(item_id, quantity)`.
///
/// `None` when no row matches or the matching row has no image.
pub fn history_image(body: &str, item_id: u32, quantity: u32) -> Option<String> {
    let doc = Html::parse_document(body);
    let s = selectors();
    let (id, qty) = (item_id.to_string(), quantity.to_string());

    doc.select(&s.history_rows)
        .find(|row| {
            cell_text(row, &s.row_item_id).as_deref() == Some(id.as_str())
                && cell_text(row, &s.row_quantity).as_deref() == Some(qty.as_str())
        })
        .and_then(|row| first_src(row.select(&s.row_image)))
}

fn cell_text(row: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector).next().map(|cell| text_of(&cell))
}

fn text_of(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_src<'a>(mut it: impl Iterator<Item = ElementRef<'a>>) -> Option<String> {
    it.next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string)
}
