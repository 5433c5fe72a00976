use serde::{Deserialize, Serialize};

use crate::geo::Geocoordinate;
use crate::{DEFAULT_FILTER_VALUE, FILTER_MAX, FILTER_MIN};

/// The "minimum value" filter behind the slider.
///
/// Dragging only moves `pending`; `committed` changes only through an
/// explicit apply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pending: f64,
    committed: f64,
}

impl FilterState {
    #[must_use]
    pub fn new(value: f64) -> Self {
        let value = Self::clamp(value).unwrap_or(DEFAULT_FILTER_VALUE);
        Self {
            pending: value,
            committed: value,
        }
    }

    #[must_use]
    pub const fn pending(&self) -> f64 {
        self.pending
    }

    #[must_use]
    pub const fn committed(&self) -> f64 {
        self.committed
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        (self.pending - self.committed).abs() > f64::EPSILON
    }

    /// Returns false (and changes nothing) for NaN.
    pub fn set_pending(&mut self, value: f64) -> bool {
        match Self::clamp(value) {
            Some(value) => {
                self.pending = value;
                true
            }
            None => false,
        }
    }

    /// Commits `value` and aligns the pending value with it.
    pub fn commit(&mut self, value: f64) -> bool {
        match Self::clamp(value) {
            Some(value) => {
                self.pending = value;
                self.committed = value;
                true
            }
            None => false,
        }
    }

    fn clamp(value: f64) -> Option<f64> {
        if value.is_nan() {
            None
        } else {
            Some(value.clamp(FILTER_MIN, FILTER_MAX))
        }
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_VALUE)
    }
}

/// One decoded search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub id: String,
    pub label: String,
    pub detail: String,
    pub location: Geocoordinate,
}

/// Parameters of one remote query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub location: Geocoordinate,
    pub min_value: f64,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    #[serde(default)]
    id: Option<String>,
    name: String,
    address: String,
    location: Geocoordinate,
}

/// Decodes a response body. One bad element fails the whole batch.
pub fn decode_results(body: &[u8]) -> Result<Vec<SearchResultItem>, serde_json::Error> {
    let items: Vec<WireItem> = serde_json::from_slice(body)?;
    Ok(items
        .into_iter()
        .enumerate()
        .map(|(index, item)| SearchResultItem {
            id: item.id.unwrap_or_else(|| format!("result-{index}")),
            label: item.name,
            detail: item.address,
            location: item.location,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod filter_state_tests {
        use super::*;

        #[test]
        fn test_default_is_zero() {
            let filter = FilterState::default();
            assert!(filter.committed().abs() < f64::EPSILON);
            assert!(filter.pending().abs() < f64::EPSILON);
        }

        #[test]
        fn test_pending_does_not_touch_committed() {
            let mut filter = FilterState::default();
            assert!(filter.set_pending(42.0));
            assert!((filter.pending() - 42.0).abs() < f64::EPSILON);
            assert!(filter.committed().abs() < f64::EPSILON);
            assert!(filter.is_dirty());
        }

        #[test]
        fn test_commit_aligns_pending() {
            let mut filter = FilterState::default();
            filter.set_pending(10.0);
            assert!(filter.commit(30.0));
            assert!((filter.committed() - 30.0).abs() < f64::EPSILON);
            assert!((filter.pending() - 30.0).abs() < f64::EPSILON);
            assert!(!filter.is_dirty());
        }

        #[test]
        fn test_values_are_clamped() {
            let mut filter = FilterState::default();
            filter.commit(250.0);
            assert!((filter.committed() - 100.0).abs() < f64::EPSILON);
            filter.set_pending(-5.0);
            assert!(filter.pending().abs() < f64::EPSILON);
        }

        #[test]
        fn test_nan_is_ignored() {
            let mut filter = FilterState::new(5.0);
            assert!(!filter.set_pending(f64::NAN));
            assert!(!filter.commit(f64::NAN));
            assert!((filter.committed() - 5.0).abs() < f64::EPSILON);
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn test_decodes_single_item() {
            let body =
                br#"[{"name":"Cafe","address":"1 Main St","location":{"lat":1.0,"lng":2.0}}]"#;
            let items = decode_results(body).unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].label, "Cafe");
            assert_eq!(items[0].detail, "1 Main St");
            assert_eq!(items[0].location.as_tuple(), (1.0, 2.0));
            assert_eq!(items[0].id, "result-0");
        }

        #[test]
        fn test_backend_id_is_kept() {
            let body = br#"[{"id":"p-9","name":"A","address":"x","location":{"lat":0,"lng":0}}]"#;
            let items = decode_results(body).unwrap();
            assert_eq!(items[0].id, "p-9");
        }

        #[test]
        fn test_extra_fields_are_ignored() {
            let body = concat!(
                r#"[{"name":"A","address":"x","protein":31.5,"#,
                r#""location":{"lat":0,"lng":0,"alt":3}}]"#
            );
            assert!(decode_results(body.as_bytes()).is_ok());
        }

        #[test]
        fn test_empty_array() {
            assert!(decode_results(b"[]").unwrap().is_empty());
        }

        #[test]
        fn test_missing_name_fails_batch() {
            let body = br#"[
                {"name":"A","address":"x","location":{"lat":0,"lng":0}},
                {"address":"y","location":{"lat":0,"lng":0}}
            ]"#;
            assert!(decode_results(body).is_err());
        }

        #[test]
        fn test_missing_address_fails_batch() {
            let body = br#"[{"name":"A","location":{"lat":0,"lng":0}}]"#;
            assert!(decode_results(body).is_err());
        }

        #[test]
        fn test_missing_location_fails_batch() {
            let body = br#"[{"name":"A","address":"x"}]"#;
            assert!(decode_results(body).is_err());
        }

        #[test]
        fn test_invalid_coordinate_fails_batch() {
            let body = br#"[{"name":"A","address":"x","location":{"lat":95,"lng":0}}]"#;
            assert!(decode_results(body).is_err());
        }

        #[test]
        fn test_non_array_body_fails() {
            assert!(decode_results(br#"{"name":"A"}"#).is_err());
            assert!(decode_results(b"not json").is_err());
        }
    }
}
