//! Title classification into category and weighted subcategories.

use crate::types::SubcategoryAllocation;

/// Category and allocations parsed from one title.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: String,
    /// Non-empty; weights sum to 100.
    pub allocations: Vec<SubcategoryAllocation>,
}

/// Splits a title such as `"Work: Deep - Review"` into a category and an
/// even split across its subcategories.
///
/// Only the first `category_delimiter` counts; later ones stay inside the
/// subcategory text. Every `subcategory_delimiter` separates a token; empty
/// tokens are dropped. Each surviving token gets `100 / N` percent.
pub fn classify_title(
    title: &str,
    category_delimiter: &str,
    subcategory_delimiter: &str,
) -> Classification {
    let Some((category, rest)) = title.split_once(category_delimiter) else {
        return Classification {
            category: normalize(title),
            allocations: vec![SubcategoryAllocation::unspecified()],
        };
    };

    let tokens: Vec<String> = rest
        .split(subcategory_delimiter)
        .map(normalize)
        .filter(|t| !t.is_empty())
        .collect();

    Classification {
        category: normalize(category),
        allocations: even_split(tokens),
    }
}

// TODO: accept explicit per-token weights (e.g. "deep 70 - review 30") once a
// title syntax for them is agreed; everything is an even split today.
fn even_split(tokens: Vec<String>) -> Vec<SubcategoryAllocation> {
    if tokens.is_empty() {
        return vec![SubcategoryAllocation::unspecified()];
    }

    #[allow(clippy::cast_precision_loss)]
    let weight_percent = 100.0 / tokens.len() as f64;
    tokens
        .into_iter()
        .map(|name| SubcategoryAllocation {
            name,
            weight_percent,
        })
        .collect()
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
