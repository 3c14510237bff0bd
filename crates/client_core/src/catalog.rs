use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::{DisciplineItem, Polarity},
    protocol::BranchBpsData,
};
use tracing::{debug, warn};

/// Placeholder items used when a branch publishes no catalog. The point
/// values are sample data, not school policy.
pub const FALLBACK_PRS_ITEMS: [(&str, i32); 4] = [
    ("Excellent Participation", 5),
    ("Helping Others", 3),
    ("Good Behavior", 2),
    ("Homework Excellence", 4),
];

pub const FALLBACK_DPS_ITEMS: [(&str, i32); 4] = [
    ("Late to Class", -2),
    ("Disruptive Behavior", -3),
    ("Incomplete Homework", -2),
    ("Disrespectful Language", -5),
];

type Resolver = fn(&Value, Polarity) -> Option<Vec<DisciplineItem>>;

const RESOLVERS: [(&str, Resolver); 2] = [("flat", resolve_flat), ("keyed", resolve_keyed)];

pub fn resolve_catalog(branch: Option<&BranchBpsData>, polarity: Polarity) -> Vec<DisciplineItem> {
    if let Some(raw) = branch.and_then(|branch| branch.discipline_items.as_ref()) {
        for (shape, resolver) in RESOLVERS {
            if let Some(items) = resolver(raw, polarity) {
                debug!(
                    "bps catalog: resolved polarity={polarity} shape={shape} count={}",
                    items.len()
                );
                return items;
            }
        }
    }

    debug!("bps catalog: no usable catalog for polarity={polarity}, using fallback");
    fallback_catalog(polarity)
}

pub fn fallback_catalog(polarity: Polarity) -> Vec<DisciplineItem> {
    let entries = match polarity {
        Polarity::Prs => &FALLBACK_PRS_ITEMS,
        Polarity::Dps => &FALLBACK_DPS_ITEMS,
    };
    entries
        .iter()
        .enumerate()
        .map(|(index, (title, points))| {
            DisciplineItem::new(
                format!("dummy_{}_{}", polarity.code(), index + 1),
                *title,
                *points,
                polarity,
            )
        })
        .collect()
}

/// `[{..., "item_type": "prs"}, ...]`
fn resolve_flat(raw: &Value, polarity: Polarity) -> Option<Vec<DisciplineItem>> {
    let entries = raw.as_array()?;
    let items: Vec<DisciplineItem> = decode_items(entries)
        .into_iter()
        .filter(|item| polarity.matches_item_type(&item.item_type))
        .collect();
    non_empty(items)
}

/// `{"prs_items": [...], "dps_items": [...]}`. Entries without an
/// `item_type` inherit the polarity of the list they sit in.
fn resolve_keyed(raw: &Value, polarity: Polarity) -> Option<Vec<DisciplineItem>> {
    let key = match polarity {
        Polarity::Prs => "prs_items",
        Polarity::Dps => "dps_items",
    };
    let entries = raw.as_object()?.get(key)?.as_array()?;
    let items: Vec<DisciplineItem> = decode_items(entries)
        .into_iter()
        .map(|mut item| {
            if item.item_type.trim().is_empty() {
                item.item_type = polarity.code().to_string();
            }
            item
        })
        .filter(|item| polarity.matches_item_type(&item.item_type))
        .collect();
    non_empty(items)
}

fn decode_items(entries: &[Value]) -> Vec<DisciplineItem> {
    entries
        .iter()
        .filter_map(|entry| match DisciplineItem::deserialize(entry) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!("skipping malformed discipline item: {err}");
                None
            }
        })
        .collect()
}

fn non_empty(items: Vec<DisciplineItem>) -> Option<Vec<DisciplineItem>> {
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
