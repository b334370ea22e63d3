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

use super::{
    Bag, DataType, Date, DateTime, DayTimeDuration, DnsName, ExprType, IpAddress, Rfc822Name,
    Time, X500Name, XPathExpression, YearMonthDuration,
};
use crate::evaluator::{self, EvaluationError};
use base64::Engine;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Reason a lexical form was rejected by its data type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct LexicalError(String);

impl LexicalError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors constructing an [`AttributeValue`]
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum ValueError {
    /// The lexical form is not valid for the data type
    #[error("`{lexical}` is not a valid {data_type}: {reason}")]
    InvalidValue {
        /// Data type the value was parsed as
        data_type: DataType,
        /// Offending lexical form
        lexical: SmolStr,
        /// Why it was rejected
        reason: LexicalError,
    },
    /// The data type URI is not in the catalog
    #[error("unknown data type `{0}`")]
    #[diagnostic(help("data types are identified by their full URI, e.g. `http://www.w3.org/2001/XMLSchema#string`"))]
    UnknownDataType(SmolStr),
}

/// An `xs:double`.
///
/// Equality and hashing are bitwise on a canonical representation: `-0.0`
/// is stored as `0.0` and every NaN as the same NaN, so `NaN == NaN`.
#[derive(Debug, Clone, Copy)]
pub struct Double(f64);

impl Double {
    /// Wrap a float, canonicalizing zero and NaN
    pub fn new(f: f64) -> Self {
        if f == 0.0 {
            Self(0.0)
        } else if f.is_nan() {
            Self(f64::NAN)
        } else {
            Self(f)
        }
    }

    /// The wrapped float
    pub fn get(self) -> f64 {
        self.0
    }

    fn parse(s: &str) -> Result<Self, LexicalError> {
        match s {
            "INF" | "+INF" => return Ok(Self(f64::INFINITY)),
            "-INF" => return Ok(Self(f64::NEG_INFINITY)),
            "NaN" => return Ok(Self(f64::NAN)),
            _ => (),
        }
        // Rust also accepts `inf`, `infinity` and `nan` in any case
        if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
            return Err(LexicalError::new("not a decimal or scientific number"));
        }
        s.parse::<f64>()
            .map(Self::new)
            .map_err(|e| LexicalError::new(e.to_string()))
    }
}

impl PartialEq for Double {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Double {}

impl Hash for Double {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_nan() {
            write!(f, "NaN")
        } else if self.0 == f64::INFINITY {
            write!(f, "INF")
        } else if self.0 == f64::NEG_INFINITY {
            write!(f, "-INF")
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Bytes of a `hexBinary` or `base64Binary` value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary(Arc<[u8]>);

impl Binary {
    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Binary {
    fn from(v: Vec<u8>) -> Self {
        Self(v.into())
    }
}

/// A single typed attribute value.
///
/// Values of different variants are never equal, even when their lexical
/// forms coincide (`integer 1` and `double 1.0` are distinct).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "TypedValue", try_from = "TypedValue")]
pub enum AttributeValue {
    /// `xs:string`
    String(SmolStr),
    /// `xs:boolean`
    Boolean(bool),
    /// `xs:integer`, limited to 64 bits
    Integer(i64),
    /// `xs:double`
    Double(Double),
    /// `xs:time`
    Time(Time),
    /// `xs:date`
    Date(Date),
    /// `xs:dateTime`
    DateTime(DateTime),
    /// `xs:dayTimeDuration`
    DayTimeDuration(DayTimeDuration),
    /// `xs:yearMonthDuration`
    YearMonthDuration(YearMonthDuration),
    /// `xs:anyURI`
    AnyUri(SmolStr),
    /// `xs:hexBinary`
    HexBinary(Binary),
    /// `xs:base64Binary`
    Base64Binary(Binary),
    /// `rfc822Name`
    Rfc822Name(Rfc822Name),
    /// `x500Name`
    X500Name(X500Name),
    /// `ipAddress`
    IpAddress(IpAddress),
    /// `dnsName`
    DnsName(DnsName),
    /// `xpathExpression`
    XPathExpression(XPathExpression),
}

impl AttributeValue {
    /// Parse a lexical form as a value of the given data type
    pub fn parse(data_type: DataType, lexical: &str) -> Result<Self, ValueError> {
        Self::parse_lexical(data_type, lexical).map_err(|reason| ValueError::InvalidValue {
            data_type,
            lexical: lexical.into(),
            reason,
        })
    }

    /// Parse a lexical form as a value of the data type named by `uri`
    pub fn parse_uri(uri: &str, lexical: &str) -> Result<Self, ValueError> {
        let data_type =
            DataType::from_uri(uri).ok_or_else(|| ValueError::UnknownDataType(uri.into()))?;
        Self::parse(data_type, lexical)
    }

    fn parse_lexical(data_type: DataType, s: &str) -> Result<Self, LexicalError> {
        let trimmed = s.trim();
        Ok(match data_type {
            DataType::String => Self::String(s.into()),
            DataType::Boolean => match trimmed {
                "true" | "1" => Self::Boolean(true),
                "false" | "0" => Self::Boolean(false),
                _ => return Err(LexicalError::new("expected `true`, `false`, `1` or `0`")),
            },
            DataType::Integer => Self::Integer(
                trimmed
                    .strip_prefix('+')
                    .unwrap_or(trimmed)
                    .parse()
                    .map_err(|e: std::num::ParseIntError| LexicalError::new(e.to_string()))?,
            ),
            DataType::Double => Self::Double(Double::parse(trimmed)?),
            DataType::Time => Self::Time(trimmed.parse()?),
            DataType::Date => Self::Date(trimmed.parse()?),
            DataType::DateTime => Self::DateTime(trimmed.parse()?),
            DataType::DayTimeDuration => Self::DayTimeDuration(trimmed.parse()?),
            DataType::YearMonthDuration => Self::YearMonthDuration(trimmed.parse()?),
            DataType::AnyUri => {
                if trimmed.chars().any(char::is_whitespace) {
                    return Err(LexicalError::new("URIs may not contain whitespace"));
                }
                Self::AnyUri(trimmed.into())
            }
            DataType::HexBinary => Self::HexBinary(
                hex::decode(trimmed)
                    .map_err(|e| LexicalError::new(e.to_string()))?
                    .into(),
            ),
            DataType::Base64Binary => {
                let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
                Self::Base64Binary(
                    base64::engine::general_purpose::STANDARD
                        .decode(compact)
                        .map_err(|e| LexicalError::new(e.to_string()))?
                        .into(),
                )
            }
            DataType::Rfc822Name => Self::Rfc822Name(trimmed.parse()?),
            DataType::X500Name => Self::X500Name(trimmed.parse()?),
            DataType::IpAddress => Self::IpAddress(trimmed.parse()?),
            DataType::DnsName => Self::DnsName(trimmed.parse()?),
            DataType::XPathExpression => Self::XPathExpression(XPathExpression::new(s, None)),
        })
    }

    /// The data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Self::String(_) => DataType::String,
            Self::Boolean(_) => DataType::Boolean,
            Self::Integer(_) => DataType::Integer,
            Self::Double(_) => DataType::Double,
            Self::Time(_) => DataType::Time,
            Self::Date(_) => DataType::Date,
            Self::DateTime(_) => DataType::DateTime,
            Self::DayTimeDuration(_) => DataType::DayTimeDuration,
            Self::YearMonthDuration(_) => DataType::YearMonthDuration,
            Self::AnyUri(_) => DataType::AnyUri,
            Self::HexBinary(_) => DataType::HexBinary,
            Self::Base64Binary(_) => DataType::Base64Binary,
            Self::Rfc822Name(_) => DataType::Rfc822Name,
            Self::X500Name(_) => DataType::X500Name,
            Self::IpAddress(_) => DataType::IpAddress,
            Self::DnsName(_) => DataType::DnsName,
            Self::XPathExpression(_) => DataType::XPathExpression,
        }
    }

    /// Shorthand for a `string` value
    pub fn string(s: impl Into<SmolStr>) -> Self {
        Self::String(s.into())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::AnyUri(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(d) => write!(f, "{d}"),
            Self::DayTimeDuration(d) => write!(f, "{d}"),
            Self::YearMonthDuration(d) => write!(f, "{d}"),
            Self::HexBinary(b) => write!(f, "{}", hex::encode_upper(b.as_bytes())),
            Self::Base64Binary(b) => write!(
                f,
                "{}",
                base64::engine::general_purpose::STANDARD.encode(b.as_bytes())
            ),
            Self::Rfc822Name(n) => write!(f, "{n}"),
            Self::X500Name(n) => write!(f, "{n}"),
            Self::IpAddress(a) => write!(f, "{a}"),
            Self::DnsName(n) => write!(f, "{n}"),
            Self::XPathExpression(x) => write!(f, "{}", x.path()),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        Self::Double(Double::new(f))
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

/// Serialized form of an [`AttributeValue`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    /// Data type URI
    pub data_type: SmolStr,
    /// Lexical form
    pub value: SmolStr,
    /// Category an `xpathExpression` is evaluated against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath_category: Option<SmolStr>,
}

impl From<AttributeValue> for TypedValue {
    fn from(v: AttributeValue) -> Self {
        let xpath_category = match &v {
            AttributeValue::XPathExpression(x) => x.category().cloned(),
            _ => None,
        };
        Self {
            data_type: v.data_type().uri(),
            value: SmolStr::new(v.to_string()),
            xpath_category,
        }
    }
}

impl TryFrom<TypedValue> for AttributeValue {
    type Error = ValueError;

    fn try_from(tv: TypedValue) -> Result<Self, Self::Error> {
        match AttributeValue::parse_uri(&tv.data_type, &tv.value)? {
            AttributeValue::XPathExpression(x) => Ok(AttributeValue::XPathExpression(
                XPathExpression::new(x.path(), tv.xpath_category),
            )),
            v => Ok(v),
        }
    }
}

/// The result of evaluating an expression: one value or a bag of values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A single value
    Attribute(AttributeValue),
    /// A bag
    Bag(Bag),
}

impl Value {
    /// The static type of this value
    pub fn expr_type(&self) -> ExprType {
        match self {
            Self::Attribute(v) => ExprType::scalar(v.data_type()),
            Self::Bag(b) => ExprType::bag(b.data_type()),
        }
    }

    /// The single value, or a type error if this is a bag
    pub fn get_as_attribute(&self) -> evaluator::Result<&AttributeValue> {
        match self {
            Self::Attribute(v) => Ok(v),
            Self::Bag(b) => Err(EvaluationError::type_error(
                "a single value",
                ExprType::bag(b.data_type()),
            )),
        }
    }

    /// The bag, or a type error if this is a single value
    pub fn get_as_bag(&self) -> evaluator::Result<&Bag> {
        match self {
            Self::Bag(b) => Ok(b),
            Self::Attribute(v) => Err(EvaluationError::type_error(
                "a bag",
                ExprType::scalar(v.data_type()),
            )),
        }
    }

    /// The boolean, or a type error
    pub fn get_as_bool(&self) -> evaluator::Result<bool> {
        match self {
            Self::Attribute(AttributeValue::Boolean(b)) => Ok(*b),
            v => Err(EvaluationError::type_error("boolean", v.expr_type())),
        }
    }

    /// The integer, or a type error
    pub fn get_as_integer(&self) -> evaluator::Result<i64> {
        match self {
            Self::Attribute(AttributeValue::Integer(i)) => Ok(*i),
            v => Err(EvaluationError::type_error("integer", v.expr_type())),
        }
    }

    /// The string, or a type error
    pub fn get_as_string(&self) -> evaluator::Result<&SmolStr> {
        match self {
            Self::Attribute(AttributeValue::String(s)) => Ok(s),
            v => Err(EvaluationError::type_error("string", v.expr_type())),
        }
    }
}

impl From<AttributeValue> for Value {
    fn from(v: AttributeValue) -> Self {
        Self::Attribute(v)
    }
}

impl From<Bag> for Value {
    fn from(b: Bag) -> Self {
        Self::Bag(b)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Attribute(b.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(v) => write!(f, "{v}"),
            Self::Bag(b) => write!(f, "{b}"),
        }
    }
}
