#![forbid(unsafe_code)]

//! Attributes: interned (foreground, background) color pairs.
//!
//! An [`Attribute`] carries its colors plus a compact `value` assigned by the
//! [`AttributeTable`] that created it. Within one table, equal values always
//! mean equal pairs, so the renderer compares attributes by value alone.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::color::Color;

#[derive(Debug, Clone, Copy, Eq)]
pub struct Attribute {
    value: u32,
    pub foreground: Color,
    pub background: Color,
}

impl Attribute {
    /// Terminal default colors. Every table assigns it value 0.
    pub const DEFAULT: Self = Self {
        value: 0,
        foreground: Color::Default,
        background: Color::Default,
    };

    /// Encoded value, unique per pair within the owning table.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

/// Per-driver intern table for attributes.
#[derive(Debug, Clone)]
pub struct AttributeTable {
    pairs: Vec<(Color, Color)>,
    index: HashMap<(Color, Color), u32>,
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeTable {
    #[must_use]
    pub fn new() -> Self {
        let default = (Color::Default, Color::Default);
        Self {
            pairs: vec![default],
            index: HashMap::from([(default, 0)]),
        }
    }

    /// Intern `(fg, bg)` and return its attribute.
    pub fn make(&mut self, foreground: Color, background: Color) -> Attribute {
        let key = (foreground, background);
        let value = match self.index.get(&key) {
            Some(&value) => value,
            None => {
                let value = u32::try_from(self.pairs.len()).unwrap_or(u32::MAX);
                self.pairs.push(key);
                self.index.insert(key, value);
                value
            }
        };
        Attribute {
            value,
            foreground,
            background,
        }
    }

    /// Recover the colors behind an encoded value.
    #[must_use]
    pub fn decode(&self, value: u32) -> Option<(Color, Color)> {
        self.pairs.get(usize::try_from(value).ok()?).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Ansi16;

    #[test]
    fn default_is_preinterned() {
        let mut table = AttributeTable::new();
        assert_eq!(table.make(Color::Default, Color::Default), Attribute::DEFAULT);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn same_pair_same_value() {
        let mut table = AttributeTable::new();
        let a = table.make(Ansi16::Red.into(), Color::rgb(1, 2, 3));
        let b = table.make(Ansi16::Red.into(), Color::rgb(1, 2, 3));
        let c = table.make(Ansi16::Red.into(), Color::rgb(1, 2, 4));
        assert_eq!(a.value(), b.value());
        assert_ne!(a, c);
    }

    #[test]
    fn decode_roundtrips_every_value() {
        let mut table = AttributeTable::new();
        let attrs: Vec<Attribute> = (0..20u8)
            .map(|i| table.make(Color::Ansi256(i), Color::Ansi256(255 - i)))
            .collect();
        for attr in attrs {
            assert_eq!(
                table.decode(attr.value()),
                Some((attr.foreground, attr.background))
            );
        }
        assert_eq!(table.decode(9999), None);
    }
}
