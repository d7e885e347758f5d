//! Human-readable descriptions for coded values.
//!
//! Closed code sets carry their own default descriptions; stored reference
//! data may override them and supplies descriptions for free-form groups such
//! as relationship codes. Anything unmapped resolves to the raw code.

use std::{collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::codes::{
  AttendanceCode, CompletionCode, DayCode, RelationshipType, SearchLevel,
  VisitStatus, VisitType, VisitorType,
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceGroup {
  VisitType,
  VisitStatus,
  CompletionCode,
  SearchLevel,
  VisitorType,
  RelationshipType,
  /// Free-form relationship codes (`SOL`, `POL`, ...); stored data only.
  Relationship,
  Attendance,
  Day,
}

/// One code within a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCode {
  pub group:       ReferenceGroup,
  pub code:        String,
  pub description: String,
}

/// Resolves `(group, code)` to a description.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDataResolver {
  stored: HashMap<(ReferenceGroup, String), String>,
}

impl ReferenceDataResolver {
  pub fn new(stored: impl IntoIterator<Item = ReferenceCode>) -> Self {
    Self {
      stored: stored
        .into_iter()
        .map(|rc| ((rc.group, rc.code), rc.description))
        .collect(),
    }
  }

  /// The description for `code`, falling back to the code itself.
  pub fn describe(&self, group: ReferenceGroup, code: &str) -> String {
    if let Some(description) = self.stored.get(&(group, code.to_owned())) {
      return description.clone();
    }
    built_in_description(group, code)
      .map(str::to_owned)
      .unwrap_or_else(|| code.to_owned())
  }

  pub fn describe_opt(&self, group: ReferenceGroup, code: Option<&str>) -> Option<String> {
    code.map(|c| self.describe(group, c))
  }

  /// Every known code in `group`: built-in codes first in declaration order,
  /// then stored-only codes sorted by code.
  pub fn codes(&self, group: ReferenceGroup) -> Vec<ReferenceCode> {
    let built_in = built_in_codes(group);
    let mut extra: Vec<&String> = self
      .stored
      .keys()
      .filter(|(g, c)| *g == group && !built_in.iter().any(|b| b == c))
      .map(|(_, c)| c)
      .collect();
    extra.sort();

    built_in
      .iter()
      .map(String::as_str)
      .chain(extra.into_iter().map(String::as_str))
      .map(|code| ReferenceCode {
        group,
        code: code.to_owned(),
        description: self.describe(group, code),
      })
      .collect()
  }
}

fn built_in_codes(group: ReferenceGroup) -> Vec<String> {
  fn names<E: IntoEnumIterator + AsRef<str>>() -> Vec<String> {
    E::iter().map(|e| e.as_ref().to_owned()).collect()
  }
  match group {
    ReferenceGroup::VisitType => names::<VisitType>(),
    ReferenceGroup::VisitStatus => names::<VisitStatus>(),
    ReferenceGroup::CompletionCode => names::<CompletionCode>(),
    ReferenceGroup::SearchLevel => names::<SearchLevel>(),
    ReferenceGroup::VisitorType => names::<VisitorType>(),
    ReferenceGroup::RelationshipType => names::<RelationshipType>(),
    ReferenceGroup::Attendance => names::<AttendanceCode>(),
    ReferenceGroup::Day => names::<DayCode>(),
    ReferenceGroup::Relationship => Vec::new(),
  }
}

fn built_in_description(group: ReferenceGroup, code: &str) -> Option<&'static str> {
  match group {
    ReferenceGroup::VisitType => VisitType::from_str(code).ok().map(VisitType::description),
    ReferenceGroup::VisitStatus => {
      VisitStatus::from_str(code).ok().map(VisitStatus::description)
    }
    ReferenceGroup::CompletionCode => {
      CompletionCode::from_str(code).ok().map(CompletionCode::description)
    }
    ReferenceGroup::SearchLevel => {
      SearchLevel::from_str(code).ok().map(SearchLevel::description)
    }
    ReferenceGroup::VisitorType => {
      VisitorType::from_str(code).ok().map(VisitorType::description)
    }
    ReferenceGroup::RelationshipType => {
      RelationshipType::from_str(code).ok().map(RelationshipType::description)
    }
    ReferenceGroup::Attendance => {
      AttendanceCode::from_str(code).ok().map(AttendanceCode::description)
    }
    ReferenceGroup::Day => DayCode::from_str(code).ok().map(DayCode::description),
    ReferenceGroup::Relationship => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn resolver() -> ReferenceDataResolver {
    ReferenceDataResolver::new([
      ReferenceCode {
        group:       ReferenceGroup::Relationship,
        code:        "SOL".into(),
        description: "Solicitor".into(),
      },
      ReferenceCode {
        group:       ReferenceGroup::Attendance,
        code:        "ABSENT".into(),
        description: "Did not attend".into(),
      },
    ])
  }

  #[test]
  fn stored_descriptions_win_over_built_ins() {
    let r = resolver();
    assert_eq!(r.describe(ReferenceGroup::Attendance, "ABSENT"), "Did not attend");
    assert_eq!(r.describe(ReferenceGroup::Attendance, "ATTENDED"), "Attended");
  }

  #[test]
  fn unmapped_codes_fall_back_to_the_raw_code() {
    let r = resolver();
    assert_eq!(r.describe(ReferenceGroup::Relationship, "XYZ"), "XYZ");
    assert_eq!(r.describe(ReferenceGroup::VisitorType, "ALIEN"), "ALIEN");
    assert_eq!(r.describe(ReferenceGroup::Relationship, "SOL"), "Solicitor");
  }

  #[test]
  fn codes_lists_built_ins_then_stored_extras() {
    let r = resolver();
    let visitor_types: Vec<_> = r
      .codes(ReferenceGroup::VisitorType)
      .into_iter()
      .map(|c| c.code)
      .collect();
    assert_eq!(visitor_types, ["CONTACT", "OPV", "PRISONER"]);

    let relationships = r.codes(ReferenceGroup::Relationship);
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0].description, "Solicitor");
  }
}
