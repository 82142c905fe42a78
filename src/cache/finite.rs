//! Detection of floats JSON cannot represent.
//!
//! `serde_json` writes NaN and the infinities as `null`, so they have to be
//! found on the original value, before it is turned into JSON.

use serde::ser::{self, Serialize};
use std::fmt;

/// First NaN or infinite float reachable from `value`, if any.
///
/// Values that fail to serialize for other reasons return `None`; the JSON
/// conversion that follows reports those.
pub(crate) fn first_non_finite<T: Serialize + ?Sized>(value: &T) -> Option<f64> {
    match value.serialize(&mut FloatScan) {
        Err(ScanError::NonFinite(v)) => Some(v),
        _ => None,
    }
}

struct FloatScan;

#[derive(Debug)]
enum ScanError {
    NonFinite(f64),
    Other(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::NonFinite(v) => write!(f, "non-finite number {v}"),
            ScanError::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ScanError {}

impl ser::Error for ScanError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ScanError::Other(msg.to_string())
    }
}

type Step = Result<(), ScanError>;

fn check(v: f64) -> Step {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ScanError::NonFinite(v))
    }
}

macro_rules! accept {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(fn $method(self, _: $ty) -> Step {
            Ok(())
        })*
    };
}

impl<'a> ser::Serializer for &'a mut FloatScan {
    type Ok = ();
    type Error = ScanError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept! {
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
        serialize_unit_struct(&'static str),
    }

    fn serialize_f32(self, v: f32) -> Step {
        check(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Step {
        check(v)
    }

    fn serialize_none(self) -> Step {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Step {
        Ok(())
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Step {
        Ok(())
    }

    fn serialize_newtype_struct<T>(self, _: &'static str, value: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, ScanError> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, ScanError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, ScanError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, ScanError> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, ScanError> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, ScanError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, ScanError> {
        Ok(self)
    }
}

impl<'a> ser::SerializeSeq for &'a mut FloatScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_element<T>(&mut self, value: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Step {
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for &'a mut FloatScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_element<T>(&mut self, value: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Step {
        Ok(())
    }
}

impl<'a> ser::SerializeTupleStruct for &'a mut FloatScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_field<T>(&mut self, value: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Step {
        Ok(())
    }
}

impl<'a> ser::SerializeTupleVariant for &'a mut FloatScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_field<T>(&mut self, value: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Step {
        Ok(())
    }
}

impl<'a> ser::SerializeMap for &'a mut FloatScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_key<T>(&mut self, key: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        key.serialize(&mut **self)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Step {
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for &'a mut FloatScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Step {
        Ok(())
    }
}

impl<'a> ser::SerializeStructVariant for &'a mut FloatScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_field<T>(&mut self, _: &'static str, value: &T) -> Step
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Step {
        Ok(())
    }
}
