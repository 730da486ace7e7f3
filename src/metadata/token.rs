//! Metadata tokens.
//!
//! A token is a 32-bit reference into a module's metadata tables: the high byte
//! selects the table, the low 24 bits the 1-based row. The decompiler uses tokens as
//! the identity of type definitions and members (work units, the discovery set and
//! symbol keys are all keyed by them).

use std::fmt;
use std::hash::{Hash, Hasher};

/// Table id of the `TypeDef` table.
pub const TABLE_TYPE_DEF: u8 = 0x02;
/// Table id of the `Field` table.
pub const TABLE_FIELD: u8 = 0x04;
/// Table id of the `MethodDef` table.
pub const TABLE_METHOD_DEF: u8 = 0x06;
/// Table id of the `Event` table.
pub const TABLE_EVENT: u8 = 0x14;
/// Table id of the `Property` table.
pub const TABLE_PROPERTY: u8 = 0x17;

/// A metadata token (table id in the high byte, row in the low 24 bits).
///
/// # Examples
///
/// ```rust
/// use dotsource::metadata::token::{Token, TABLE_TYPE_DEF};
///
/// let token = Token::from_parts(TABLE_TYPE_DEF, 3);
/// assert_eq!(token.value(), 0x0200_0003);
/// assert!(token.is_type_def());
/// assert_eq!(token.row(), 3);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Creates a token from its raw value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a row number.
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// The raw token value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The table id (high byte).
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The 1-based row (low 24 bits).
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// A token with row 0 does not reference anything.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.row() == 0
    }

    /// Returns `true` for a non-nil `TypeDef` token.
    #[must_use]
    pub fn is_type_def(&self) -> bool {
        self.table() == TABLE_TYPE_DEF && !self.is_nil()
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
