/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Policy versions and the version constraints carried by policy references.

use itertools::Itertools;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A version string or version pattern was malformed
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("invalid version `{0}`")]
#[diagnostic(help("versions are dot-separated non-negative integers such as `1.0.2`"))]
pub struct VersionError(SmolStr);

/// A policy version: a non-empty dot-separated sequence of integers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "SmolStr", try_from = "SmolStr")]
pub struct Version(Vec<u32>);

impl Version {
    /// The components of the version
    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self(vec![1, 0])
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// Component-wise, with missing trailing components counting as zero
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip_longest(other.0.iter())
            .map(|pair| {
                let (a, b) = pair.or(&0, &0);
                a.cmp(b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split('.')
            .map(|c| {
                if c.is_empty() || !c.bytes().all(|b| b.is_ascii_digit()) {
                    None
                } else {
                    c.parse().ok()
                }
            })
            .collect::<Option<Vec<u32>>>()
            .map(Self)
            .ok_or_else(|| VersionError(s.into()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join("."))
    }
}

impl From<Version> for SmolStr {
    fn from(v: Version) -> Self {
        SmolStr::new(v.to_string())
    }
}

impl TryFrom<SmolStr> for Version {
    type Error = VersionError;

    fn try_from(s: SmolStr) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PatternComponent {
    Number(u32),
    /// `*`: any single component
    Any,
    /// `+`: any (possibly empty) sequence of further components
    Rest,
}

/// A version pattern such as `1.*.3` or `2.+`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "SmolStr", try_from = "SmolStr")]
pub struct VersionPattern(Vec<PatternComponent>);

impl VersionPattern {
    /// Whether `version` matches this pattern exactly
    pub fn matches(&self, version: &Version) -> bool {
        fn go(pattern: &[PatternComponent], version: &[u32]) -> bool {
            match (pattern.split_first(), version.split_first()) {
                (None, None) => true,
                (Some((PatternComponent::Rest, _)), _) => true,
                (Some((PatternComponent::Any, p)), Some((_, v))) => go(p, v),
                (Some((PatternComponent::Number(n), p)), Some((m, v))) => n == m && go(p, v),
                _ => false,
            }
        }
        go(&self.0, version.components())
    }

    /// Compare `version` against the pattern treating wildcards as the
    /// bound given by `wildcard`: [`Ordering::Less`] makes a wildcard the
    /// smallest possible value, [`Ordering::Greater`] the largest.
    fn compare(&self, version: &Version, wildcard: Ordering) -> Ordering {
        for (i, p) in self.0.iter().enumerate() {
            let v = version.components().get(i).copied().unwrap_or(0);
            match p {
                PatternComponent::Number(n) => match v.cmp(n) {
                    Ordering::Equal => continue,
                    o => return o,
                },
                PatternComponent::Any | PatternComponent::Rest => return wildcard.reverse(),
            }
        }
        if version.components().iter().skip(self.0.len()).any(|c| *c > 0) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// Whether `version` is no earlier than this pattern, wildcards matching
    /// anything
    pub fn lower_bounds(&self, version: &Version) -> bool {
        self.compare(version, Ordering::Less) != Ordering::Less
    }

    /// Whether `version` is no later than this pattern, wildcards matching
    /// anything
    pub fn upper_bounds(&self, version: &Version) -> bool {
        self.compare(version, Ordering::Greater) != Ordering::Greater
    }
}

impl FromStr for VersionPattern {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionError(s.into());
        let components = s
            .split('.')
            .map(|c| match c {
                "*" => Ok(PatternComponent::Any),
                "+" => Ok(PatternComponent::Rest),
                c if !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()) => {
                    c.parse().map(PatternComponent::Number).map_err(|_| err())
                }
                _ => Err(err()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        // `+` may only end a pattern
        if components
            .iter()
            .rev()
            .skip(1)
            .any(|c| *c == PatternComponent::Rest)
        {
            return Err(err());
        }
        Ok(Self(components))
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.0.iter().map(|c| match c {
            PatternComponent::Number(n) => n.to_string(),
            PatternComponent::Any => "*".to_string(),
            PatternComponent::Rest => "+".to_string(),
        });
        write!(f, "{}", parts.format("."))
    }
}

impl From<VersionPattern> for SmolStr {
    fn from(v: VersionPattern) -> Self {
        SmolStr::new(v.to_string())
    }
}

impl TryFrom<SmolStr> for VersionPattern {
    type Error = VersionError;

    fn try_from(s: SmolStr) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Constraints a policy reference places on the version of its target
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConstraints {
    /// The version must match this pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionPattern>,
    /// The version must not be earlier than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest: Option<VersionPattern>,
    /// The version must not be later than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<VersionPattern>,
}

impl VersionConstraints {
    /// Whether `version` satisfies every constraint
    pub fn satisfied_by(&self, version: &Version) -> bool {
        self.version.as_ref().is_none_or(|p| p.matches(version))
            && self.earliest.as_ref().is_none_or(|p| p.lower_bounds(version))
            && self.latest.as_ref().is_none_or(|p| p.upper_bounds(version))
    }
}
