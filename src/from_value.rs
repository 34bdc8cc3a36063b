use crate::value::Value;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A conversion trait from a decoded cell into a Rust type.
///
/// A `FromValue` implementation for a Rust type is needed for using it as a
/// return parameter from [`ResultSet#get`] or [`ResultSet#try_get`]. The
/// following Rust types are already implemented to match the given server
/// types:
///
/// |Rust type|Server type|
/// |--------|--------|
/// |`bool`|`tinyint(1)`|
/// |`u8`/`i8`|`tinyint`|
/// |`u16`/`i16`|`smallint`|
/// |`u32`/`i32`|`mediumint`/`int`|
/// |`u64`/`i64`|`bigint` (and `bit` for `u64`)|
/// |`f32`/`f64`|`float`/`double`|
/// |`String`/`&str`|`varchar`/`char`/`text`/`json`|
/// |`Vec<u8>`/`&[u8]`|`varbinary`/`binary`/`blob`|
/// |[`Uuid`]|`char(36)`/`binary(16)`|
/// |[`Decimal`]|`decimal`|
/// |[`NaiveDateTime`]|`datetime`/`timestamp`|
/// |[`NaiveDate`]|`date`|
/// |[`Duration`]|`time`|
///
/// Smaller integers widen into larger ones of matching signedness; everything
/// else converts only from its own server type.
pub trait FromValue<'a>
where
    Self: Sized,
{
    /// Returns the converted value, `None` being a null value.
    fn from_value(value: Value<'a>) -> crate::Result<Option<Self>>;
}

macro_rules! from_value {
    ($ty:ty : $( $pat:pat => $exp:expr ),* $(,)?) => {
        impl<'a> FromValue<'a> for $ty {
            fn from_value(value: Value<'a>) -> crate::Result<Option<Self>> {
                match value {
                    Value::Null => Ok(None),
                    $( $pat => Ok(Some($exp)), )*
                    v => Err(crate::Error::Conversion(
                        format!(concat!("cannot interpret {:?} as a ", stringify!($ty), " value"), v).into(),
                    )),
                }
            }
        }
    };
}

from_value!(bool: Value::Bool(v) => v);
from_value!(i8: Value::Int8(v) => v);
from_value!(u8: Value::UInt8(v) => v);
from_value!(i16:
    Value::Int16(v) => v,
    Value::Int8(v) => v.into(),
    Value::UInt8(v) => v.into(),
);
from_value!(u16:
    Value::UInt16(v) => v,
    Value::UInt8(v) => v.into(),
);
from_value!(i32:
    Value::Int32(v) => v,
    Value::Int16(v) => v.into(),
    Value::Int8(v) => v.into(),
    Value::UInt16(v) => v.into(),
    Value::UInt8(v) => v.into(),
);
from_value!(u32:
    Value::UInt32(v) => v,
    Value::UInt16(v) => v.into(),
    Value::UInt8(v) => v.into(),
);
from_value!(i64:
    Value::Int64(v) => v,
    Value::Int32(v) => v.into(),
    Value::Int16(v) => v.into(),
    Value::Int8(v) => v.into(),
    Value::UInt32(v) => v.into(),
    Value::UInt16(v) => v.into(),
    Value::UInt8(v) => v.into(),
);
from_value!(u64:
    Value::UInt64(v) => v,
    Value::UInt32(v) => v.into(),
    Value::UInt16(v) => v.into(),
    Value::UInt8(v) => v.into(),
);
from_value!(f32: Value::Float(v) => v);
from_value!(f64:
    Value::Double(v) => v,
    Value::Float(v) => v.into(),
);
from_value!(Decimal: Value::Decimal(v) => v);
from_value!(Uuid: Value::Uuid(v) => v);
from_value!(NaiveDate: Value::Date(v) => v);
from_value!(NaiveDateTime:
    Value::DateTime(v) => v,
    Value::Date(v) => v.and_time(NaiveTime::MIN),
);
from_value!(Duration: Value::Time(v) => v);
from_value!(String: Value::Text(v) => v.into_owned());
from_value!(Vec<u8>:
    Value::Bytes(v) => v.into_owned(),
    Value::Text(v) => v.into_owned().into_bytes(),
);

impl<'a> FromValue<'a> for &'a str {
    fn from_value(value: Value<'a>) -> crate::Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Text(std::borrow::Cow::Borrowed(s)) => Ok(Some(s)),
            v => Err(crate::Error::Conversion(
                format!("cannot interpret {:?} as a &str value", v).into(),
            )),
        }
    }
}

impl<'a> FromValue<'a> for &'a [u8] {
    fn from_value(value: Value<'a>) -> crate::Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Bytes(std::borrow::Cow::Borrowed(b)) => Ok(Some(b)),
            Value::Text(std::borrow::Cow::Borrowed(s)) => Ok(Some(s.as_bytes())),
            v => Err(crate::Error::Conversion(
                format!("cannot interpret {:?} as a &[u8] value", v).into(),
            )),
        }
    }
}
