//! Filtering, sorting and aggregation over mirrored properties.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::geo::{self, haversine_km};
use crate::model::{PropertyRecord, PropertyStatus, PropertyType, PropertyView};

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    Area,
    Value,
    Location,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query string shared by the list and search endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PropertyQuery {
    pub skip: usize,
    pub limit: Option<usize>,
    pub property_type: Option<PropertyType>,
    pub status: Option<PropertyStatus>,
    pub verified_only: bool,
    pub owner_address: Option<String>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub q: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

/// A validated radius filter.
#[derive(Debug, Clone, Copy)]
pub struct Radius {
    pub center: (f64, f64),
    pub km: f64,
}

impl PropertyQuery {
    pub fn limit(&self) -> Result<usize, ApiError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::Validation(format!("limit must be within 1..={MAX_LIMIT}")));
        }
        Ok(limit)
    }

    pub fn radius(&self) -> Result<Option<Radius>, ApiError> {
        match (self.latitude, self.longitude, self.radius_km) {
            (None, None, None) => Ok(None),
            (Some(lat), Some(lon), Some(km)) => {
                geo::check_point(lat, lon).map_err(ApiError::Validation)?;
                if !(km > 0.0) {
                    return Err(ApiError::Validation("radius_km must be positive".into()));
                }
                Ok(Some(Radius { center: (lat, lon), km }))
            }
            _ => Err(ApiError::Validation(
                "latitude, longitude and radius_km go together".into(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        self.limit()?;
        self.radius()?;
        if let (Some(min), Some(max)) = (self.min_area, self.max_area) {
            if min > max {
                return Err(ApiError::Validation("min_area exceeds max_area".into()));
            }
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(ApiError::Validation("min_value exceeds max_value".into()));
            }
        }
        Ok(())
    }

    pub fn matches(&self, p: &PropertyRecord, radius: Option<&Radius>) -> bool {
        if self.property_type.is_some_and(|t| t != p.property_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != p.status) {
            return false;
        }
        if self.verified_only && !p.is_verified {
            return false;
        }
        if let Some(owner) = &self.owner_address {
            if *owner != p.owner_address {
                return false;
            }
        }
        if self.min_area.is_some_and(|min| p.area < min) || self.max_area.is_some_and(|max| p.area > max) {
            return false;
        }
        if self.min_value.is_some_and(|min| p.value < min)
            || self.max_value.is_some_and(|max| p.value > max)
        {
            return false;
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            if !p.location.to_lowercase().contains(&q.to_lowercase()) {
                return false;
            }
        }
        if let Some(r) = radius {
            match distance_km(p, r.center) {
                Some(d) if d <= r.km => {}
                _ => return false,
            }
        }
        true
    }

    /// Filter and sort `all`, ignoring paging.
    pub fn select(&self, all: Vec<PropertyRecord>) -> Result<Vec<PropertyRecord>, ApiError> {
        self.validate()?;
        let radius = self.radius()?;
        let mut hits: Vec<PropertyRecord> =
            all.into_iter().filter(|p| self.matches(p, radius.as_ref())).collect();
        sort(&mut hits, self.sort_by, self.sort_order);
        Ok(hits)
    }

    /// Filter, sort and page `all`. Returns the page and the filtered total.
    pub fn run(&self, all: Vec<PropertyRecord>) -> Result<Page, ApiError> {
        let limit = self.limit()?;
        let hits = self.select(all)?;

        let total = hits.len();
        let properties = hits
            .into_iter()
            .skip(self.skip)
            .take(limit)
            .map(PropertyRecord::into_view)
            .collect();
        Ok(Page {
            properties,
            total,
            skip: self.skip,
            limit,
            has_next: self.skip.saturating_add(limit) < total,
            has_prev: self.skip > 0,
        })
    }
}

pub fn sort(items: &mut [PropertyRecord], by: SortBy, order: SortOrder) {
    items.sort_by(|a, b| {
        let ord = match by {
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            SortBy::Area => a.area.total_cmp(&b.area),
            SortBy::Value => a.value.cmp(&b.value),
            SortBy::Location => a.location.cmp(&b.location),
        }
        .then(a.token_id.cmp(&b.token_id));
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

pub fn distance_km(p: &PropertyRecord, center: (f64, f64)) -> Option<f64> {
    p.coordinates.as_ref()?.anchor().map(|a| haversine_km(center, a))
}

#[derive(Debug, Serialize)]
pub struct Page {
    pub properties: Vec<PropertyView>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Overview {
    pub total_properties: usize,
    pub verified_properties: usize,
    pub verification_rate: f64,
    pub total_area: f64,
    pub average_area: f64,
    pub total_value: i128,
    pub average_value: i64,
    pub by_type: BTreeMap<&'static str, usize>,
    pub by_status: BTreeMap<&'static str, usize>,
    pub unique_owners: usize,
}

pub fn overview(all: &[PropertyRecord]) -> Overview {
    let total = all.len();
    let verified = all.iter().filter(|p| p.is_verified).count();
    let total_area: f64 = all.iter().map(|p| p.area).sum();
    // i64 values summed in i128 cannot overflow.
    let total_value: i128 = all.iter().map(|p| i128::from(p.value)).sum();

    let mut by_type = BTreeMap::new();
    let mut by_status = BTreeMap::new();
    for p in all {
        *by_type.entry(p.property_type.as_str()).or_insert(0) += 1;
        *by_status.entry(p.status.as_str()).or_insert(0) += 1;
    }
    let owners: HashSet<&str> = all.iter().map(|p| p.owner_address.as_str()).collect();

    Overview {
        total_properties: total,
        verified_properties: verified,
        verification_rate: if total == 0 {
            0.0
        } else {
            (verified as f64 / total as f64 * 10_000.0).round() / 100.0
        },
        total_area,
        average_area: if total == 0 { 0.0 } else { total_area / total as f64 },
        total_value,
        // the mean of i64 values is itself an i64
        average_value: if total == 0 { 0 } else { (total_value / total as i128) as i64 },
        by_type,
        by_status,
        unique_owners: owners.len(),
    }
}
