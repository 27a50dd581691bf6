//! Location preferences and the household effective search scope.
//!
//! Each member picks cities and/or neighborhoods. A member who picked any
//! neighborhood is scoped to those neighborhoods only; their city picks are
//! ignored. The household scope is the union over members.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::property::Property;

/// A city-level selection.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CitySelection {
  pub city:  String,
  pub state: String,
}

impl CitySelection {
  pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
    Self { city: city.into(), state: state.into() }.normalized()
  }

  /// Trim both parts and upper-case the state code.
  pub fn normalized(self) -> Self {
    Self {
      city:  self.city.trim().to_owned(),
      state: self.state.trim().to_uppercase(),
    }
  }
}

/// One user's stored preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationPreference {
  #[serde(default)]
  pub cities:        Vec<CitySelection>,
  #[serde(default)]
  pub neighborhoods: Vec<String>,
}

impl LocationPreference {
  /// Normalise entries, drop blanks, and remove duplicates while keeping the
  /// first-seen order.
  pub fn normalized(self) -> Self {
    let mut seen_cities = BTreeSet::new();
    let cities = self
      .cities
      .into_iter()
      .map(CitySelection::normalized)
      .filter(|c| !c.city.is_empty() && !c.state.is_empty())
      .filter(|c| seen_cities.insert(c.clone()))
      .collect();

    let mut seen_hoods = BTreeSet::new();
    let neighborhoods = self
      .neighborhoods
      .into_iter()
      .map(|n| n.trim().to_owned())
      .filter(|n| !n.is_empty())
      .filter(|n| seen_hoods.insert(n.clone()))
      .collect();

    Self { cities, neighborhoods }
  }
}

/// The merged household filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveScope {
  pub cities:        BTreeSet<CitySelection>,
  pub neighborhoods: BTreeSet<String>,
}

impl EffectiveScope {
  pub fn is_empty(&self) -> bool {
    self.cities.is_empty() && self.neighborhoods.is_empty()
  }

  /// Whether `property` falls inside this scope. An empty scope places no
  /// restriction and contains everything.
  pub fn contains(&self, property: &Property) -> bool {
    if self.is_empty() {
      return true;
    }
    if let Some(hood) = &property.neighborhood_id
      && self.neighborhoods.contains(hood)
    {
      return true;
    }
    self
      .cities
      .contains(&CitySelection::new(property.city.as_str(), property.state.as_str()))
  }
}

/// Merge member preferences into the household scope.
pub fn effective_scope<'a, I>(members: I) -> EffectiveScope
where
  I: IntoIterator<Item = &'a LocationPreference>,
{
  let mut scope = EffectiveScope::default();
  for pref in members {
    if pref.neighborhoods.is_empty() {
      scope
        .cities
        .extend(pref.cities.iter().cloned().map(CitySelection::normalized));
    } else {
      scope
        .neighborhoods
        .extend(pref.neighborhoods.iter().map(|n| n.trim().to_owned()));
    }
  }
  scope
}
