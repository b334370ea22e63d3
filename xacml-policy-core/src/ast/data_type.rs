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

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

const XS: &str = "http://www.w3.org/2001/XMLSchema#";

/// The fixed catalog of attribute data types.
///
/// Every [`crate::ast::AttributeValue`] carries exactly one of these, and no
/// operation in the engine converts implicitly between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "SmolStr", try_from = "SmolStr")]
pub enum DataType {
    /// `xs:string`
    String,
    /// `xs:boolean`
    Boolean,
    /// `xs:integer`
    Integer,
    /// `xs:double`
    Double,
    /// `xs:time`
    Time,
    /// `xs:date`
    Date,
    /// `xs:dateTime`
    DateTime,
    /// `xs:dayTimeDuration`
    DayTimeDuration,
    /// `xs:yearMonthDuration`
    YearMonthDuration,
    /// `xs:anyURI`
    AnyUri,
    /// `xs:hexBinary`
    HexBinary,
    /// `xs:base64Binary`
    Base64Binary,
    /// An e-mail style name
    Rfc822Name,
    /// An X.500 distinguished name
    X500Name,
    /// An IPv4 or IPv6 address with optional mask and port range
    IpAddress,
    /// A DNS host name with optional port range
    DnsName,
    /// An XPath expression (carried as a value, never evaluated)
    XPathExpression,
}

impl DataType {
    /// Every data type, in catalog order
    pub const ALL: [DataType; 17] = [
        DataType::String,
        DataType::Boolean,
        DataType::Integer,
        DataType::Double,
        DataType::Time,
        DataType::Date,
        DataType::DateTime,
        DataType::DayTimeDuration,
        DataType::YearMonthDuration,
        DataType::AnyUri,
        DataType::HexBinary,
        DataType::Base64Binary,
        DataType::Rfc822Name,
        DataType::X500Name,
        DataType::IpAddress,
        DataType::DnsName,
        DataType::XPathExpression,
    ];

    /// The short name used in function identifiers, e.g. `anyURI` in
    /// `anyURI-equal`
    pub fn short_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Time => "time",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::DayTimeDuration => "dayTimeDuration",
            Self::YearMonthDuration => "yearMonthDuration",
            Self::AnyUri => "anyURI",
            Self::HexBinary => "hexBinary",
            Self::Base64Binary => "base64Binary",
            Self::Rfc822Name => "rfc822Name",
            Self::X500Name => "x500Name",
            Self::IpAddress => "ipAddress",
            Self::DnsName => "dnsName",
            Self::XPathExpression => "xpathExpression",
        }
    }

    /// The identifying URI of this data type
    pub fn uri(self) -> SmolStr {
        match self {
            Self::Rfc822Name | Self::X500Name => SmolStr::new(format!(
                "urn:oasis:names:tc:xacml:1.0:data-type:{}",
                self.short_name()
            )),
            Self::IpAddress | Self::DnsName => SmolStr::new(format!(
                "urn:oasis:names:tc:xacml:2.0:data-type:{}",
                self.short_name()
            )),
            Self::XPathExpression => {
                SmolStr::new_static("urn:oasis:names:tc:xacml:3.0:data-type:xpathExpression")
            }
            _ => SmolStr::new(format!("{XS}{}", self.short_name())),
        }
    }

    /// Look up a data type by URI.
    ///
    /// The pre-3.0 duration URIs from the 2002 XQuery operators draft are
    /// accepted as aliases.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/TR/2002/WD-xquery-operators-20020816#dayTimeDuration" => {
                return Some(Self::DayTimeDuration)
            }
            "http://www.w3.org/TR/2002/WD-xquery-operators-20020816#yearMonthDuration" => {
                return Some(Self::YearMonthDuration)
            }
            _ => (),
        }
        Self::ALL.into_iter().find(|dt| dt.uri() == uri)
    }

    /// Whether the data type has an equality function in the standard catalog
    pub fn has_equality(self) -> bool {
        !matches!(
            self,
            Self::IpAddress | Self::DnsName | Self::XPathExpression
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl From<DataType> for SmolStr {
    fn from(dt: DataType) -> Self {
        dt.uri()
    }
}

impl TryFrom<SmolStr> for DataType {
    type Error = super::ValueError;

    fn try_from(uri: SmolStr) -> Result<Self, Self::Error> {
        Self::from_uri(&uri).ok_or(super::ValueError::UnknownDataType(uri))
    }
}

/// The static type of an expression: a data type, either as a single value
/// or as a bag of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprType {
    /// The data type of the value (or of every member of the bag)
    pub data_type: DataType,
    /// Whether the expression evaluates to a bag
    pub is_bag: bool,
}

impl ExprType {
    /// A single value of type `data_type`
    pub const fn scalar(data_type: DataType) -> Self {
        Self {
            data_type,
            is_bag: false,
        }
    }

    /// A bag of values of type `data_type`
    pub const fn bag(data_type: DataType) -> Self {
        Self {
            data_type,
            is_bag: true,
        }
    }

    /// Shorthand for `boolean`
    pub const fn boolean() -> Self {
        Self::scalar(DataType::Boolean)
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bag {
            write!(f, "bag<{}>", self.data_type)
        } else {
            write!(f, "{}", self.data_type)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uris_round_trip() {
        for dt in DataType::ALL {
            assert_eq!(DataType::from_uri(&dt.uri()), Some(dt));
        }
    }

    #[test]
    fn legacy_duration_uris() {
        assert_eq!(
            DataType::from_uri(
                "http://www.w3.org/TR/2002/WD-xquery-operators-20020816#dayTimeDuration"
            ),
            Some(DataType::DayTimeDuration)
        );
        assert_eq!(DataType::from_uri("urn:example:nope"), None);
    }

    #[test]
    fn expr_type_display() {
        assert_eq!(ExprType::bag(DataType::AnyUri).to_string(), "bag<anyURI>");
        assert_eq!(ExprType::scalar(DataType::Integer).to_string(), "integer");
    }
}
