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

use super::LexicalError;
use itertools::Itertools;
use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// An RFC 822 mail address.
///
/// The local part is case sensitive; the domain is not and is stored
/// lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rfc822Name {
    local: SmolStr,
    domain: SmolStr,
}

impl Rfc822Name {
    /// The part before `@`
    pub fn local_part(&self) -> &str {
        &self.local
    }

    /// The lower-cased part after `@`
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `rfc822Name-match`: `pattern` is either a complete address, a domain
    /// name (matching that host exactly), or a domain starting with `.`
    /// (matching any host in that domain).
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if let Some((local, domain)) = pattern.split_once('@') {
            local == self.local && domain.eq_ignore_ascii_case(&self.domain)
        } else if pattern.starts_with('.') {
            self.domain.ends_with(&pattern.to_ascii_lowercase())
        } else {
            pattern.eq_ignore_ascii_case(&self.domain)
        }
    }
}

impl FromStr for Rfc822Name {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('@').collect_tuple() {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(Self {
                local: local.into(),
                domain: domain.to_ascii_lowercase().into(),
            }),
            _ => Err(LexicalError::new("expected `local@domain`")),
        }
    }
}

impl fmt::Display for Rfc822Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// An X.500 distinguished name such as `CN=Steve Kille, O=Isode Limited, C=GB`.
///
/// Comparison uses a normalized RDN sequence (attribute types upper-cased,
/// values trimmed and lower-cased); `Display` gives the name as written.
#[derive(Debug, Clone)]
pub struct X500Name {
    rdns: Vec<(SmolStr, SmolStr)>,
    original: SmolStr,
}

impl X500Name {
    /// `x500Name-match`: whether `self` is a terminal sequence of `other`'s
    /// RDNs
    pub fn is_terminal_of(&self, other: &X500Name) -> bool {
        other.rdns.ends_with(&self.rdns)
    }
}

/// Split on unescaped commas
fn split_rdns(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' | ';' if !escaped => {
                parts.push(s.get(start..i).unwrap_or_default());
                start = i + 1;
            }
            _ => escaped = false,
        }
    }
    parts.push(s.get(start..).unwrap_or_default());
    parts
}

impl FromStr for X500Name {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rdns = split_rdns(s)
            .into_iter()
            .map(|rdn| match rdn.split_once('=') {
                Some((ty, value)) if !ty.trim().is_empty() => Ok((
                    SmolStr::new(ty.trim().to_ascii_uppercase()),
                    SmolStr::new(value.trim().to_lowercase()),
                )),
                _ => Err(LexicalError::new(format!(
                    "`{rdn}` is not an attribute type and value pair"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rdns,
            original: s.into(),
        })
    }
}

impl PartialEq for X500Name {
    fn eq(&self, other: &Self) -> bool {
        self.rdns == other.rdns
    }
}

impl Eq for X500Name {}

impl Hash for X500Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rdns.hash(state);
    }
}

impl fmt::Display for X500Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// An XPath expression carried as data. The engine never evaluates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XPathExpression {
    path: SmolStr,
    category: Option<SmolStr>,
}

impl XPathExpression {
    /// An expression over the content of `category`
    pub fn new(path: impl Into<SmolStr>, category: Option<SmolStr>) -> Self {
        Self {
            path: path.into(),
            category,
        }
    }

    /// The path text
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The category whose content the path addresses
    pub fn category(&self) -> Option<&SmolStr> {
        self.category.as_ref()
    }
}
