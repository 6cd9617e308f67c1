//! Schema-driven binary row codec: typed logical values encode to and
//! decode from the compact little-endian tuple format described in the
//! spec (null bitmap, then fixed/variable payloads in column order).

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int32,
    UInt32,
    Float64,
    Bool,
    VarChar(u32),
    Blob(u32),
}

impl ColumnType {
    pub fn type_tag(&self) -> u8 {
        match self {
            ColumnType::Int32 => 0,
            ColumnType::UInt32 => 1,
            ColumnType::Float64 => 2,
            ColumnType::Bool => 3,
            ColumnType::VarChar(_) => 4,
            ColumnType::Blob(_) => 5,
        }
    }

    pub fn max_len(&self) -> Option<u32> {
        match self {
            ColumnType::VarChar(n) | ColumnType::Blob(n) => Some(*n),
            _ => None,
        }
    }

    fn fixed_width(&self) -> Option<usize> {
        match self {
            ColumnType::Int32 | ColumnType::UInt32 => Some(4),
            ColumnType::Float64 => Some(8),
            ColumnType::Bool => Some(1),
            ColumnType::VarChar(_) | ColumnType::Blob(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn null_bitmap_len(&self) -> usize {
        self.columns.len().div_ceil(8)
    }
}

/// A logical value passed across the engine boundary. `VarChar`/`Blob`
/// inputs arrive as text/bytes respectively; `Bool` accepts the native
/// boolean form (the "0/1 numeric" acceptance named in the spec is a
/// host-boundary convenience the caller applies before constructing this).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int32(i32),
    UInt32(u32),
    Float64(f64),
    Bool(bool),
    VarChar(String),
    Blob(Vec<u8>),
}

pub fn encode(schema: &Schema, values: &[Value]) -> Result<Vec<u8>, StorageError> {
    if values.len() != schema.columns.len() {
        return Err(StorageError::SchemaMismatch {
            expected: schema.columns.len(),
            got: values.len(),
        });
    }

    let bitmap_len = schema.null_bitmap_len();
    let mut bitmap = vec![0u8; bitmap_len];
    let mut payload = Vec::new();

    for (i, (column, value)) in schema.columns.iter().zip(values.iter()).enumerate() {
        if matches!(value, Value::Null) {
            if !column.nullable {
                return Err(StorageError::InvalidValue {
                    column: column.name.clone(),
                    reason: "null in non-nullable column".into(),
                });
            }
            bitmap[i / 8] |= 1 << (i % 8);
            continue;
        }

        encode_value(column, value, &mut payload)?;
    }

    let mut out = bitmap;
    out.extend(payload);
    Ok(out)
}

fn encode_value(column: &Column, value: &Value, out: &mut Vec<u8>) -> Result<(), StorageError> {
    let mismatch = || StorageError::InvalidValue {
        column: column.name.clone(),
        reason: format!("value does not match declared type {:?}", column.ty),
    };

    match (&column.ty, value) {
        (ColumnType::Int32, Value::Int32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::UInt32, Value::UInt32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::Float64, Value::Float64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::Bool, Value::Bool(v)) => out.push(if *v { 1 } else { 0 }),
        (ColumnType::VarChar(max_len), Value::VarChar(s)) => {
            let bytes = s.as_bytes();
            if bytes.len() as u32 > *max_len {
                return Err(StorageError::Overflow {
                    column: column.name.clone(),
                    max_len: *max_len,
                    actual: bytes.len(),
                });
            }
            out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
            out.extend_from_slice(bytes);
        }
        (ColumnType::Blob(max_len), Value::Blob(b)) => {
            if b.len() as u32 > *max_len {
                return Err(StorageError::Overflow {
                    column: column.name.clone(),
                    max_len: *max_len,
                    actual: b.len(),
                });
            }
            out.extend_from_slice(&(b.len() as u16).to_le_bytes());
            out.extend_from_slice(b);
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}

pub fn decode(schema: &Schema, bytes: &[u8]) -> Result<Vec<Value>, StorageError> {
    let bitmap_len = schema.null_bitmap_len();
    if bytes.len() < bitmap_len {
        return Err(StorageError::Truncated);
    }
    let bitmap = &bytes[..bitmap_len];
    let mut cursor = bitmap_len;
    let mut values = Vec::with_capacity(schema.columns.len());

    for (i, column) in schema.columns.iter().enumerate() {
        let is_null = bitmap[i / 8] & (1 << (i % 8)) != 0;
        if is_null {
            values.push(Value::Null);
            continue;
        }

        let value = decode_value(&column.ty, bytes, &mut cursor)?;
        values.push(value);
    }

    Ok(values)
}

fn take<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], StorageError> {
    if *cursor + len > bytes.len() {
        return Err(StorageError::Truncated);
    }
    let slice = &bytes[*cursor..*cursor + len];
    *cursor += len;
    Ok(slice)
}

fn decode_value(ty: &ColumnType, bytes: &[u8], cursor: &mut usize) -> Result<Value, StorageError> {
    if let Some(width) = ty.fixed_width() {
        let slice = take(bytes, cursor, width)?;
        return Ok(match ty {
            ColumnType::Int32 => Value::Int32(i32::from_le_bytes(slice.try_into().unwrap())),
            ColumnType::UInt32 => Value::UInt32(u32::from_le_bytes(slice.try_into().unwrap())),
            ColumnType::Float64 => Value::Float64(f64::from_le_bytes(slice.try_into().unwrap())),
            ColumnType::Bool => Value::Bool(slice[0] != 0),
            _ => unreachable!("fixed_width only returns Some for these variants"),
        });
    }

    let len_bytes = take(bytes, cursor, 2)?;
    let len = u16::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
    let data = take(bytes, cursor, len)?;

    match ty {
        ColumnType::VarChar(_) => {
            let s = std::str::from_utf8(data).map_err(|_| StorageError::InvalidUtf8)?;
            Ok(Value::VarChar(s.to_string()))
        }
        ColumnType::Blob(_) => Ok(Value::Blob(data.to_vec())),
        _ => unreachable!("fixed-width variants are handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> Schema {
        Schema {
            columns: vec![
                Column {
                    name: "id".into(),
                    ty: ColumnType::Int32,
                    nullable: false,
                },
                Column {
                    name: "name".into(),
                    ty: ColumnType::VarChar(32),
                    nullable: false,
                },
                Column {
                    name: "bio".into(),
                    ty: ColumnType::VarChar(64),
                    nullable: true,
                },
            ],
        }
    }

    #[test]
    fn round_trips_mixed_nullable_row() {
        let schema = users_schema();
        let values = vec![
            Value::Int32(1),
            Value::VarChar("Alice".into()),
            Value::Null,
        ];
        let bytes = encode(&schema, &values).unwrap();
        let decoded = decode(&schema, &bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn rejects_null_in_non_nullable_column() {
        let schema = users_schema();
        let values = vec![Value::Null, Value::VarChar("x".into()), Value::Null];
        assert!(matches!(
            encode(&schema, &values),
            Err(StorageError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rejects_schema_mismatch() {
        let schema = users_schema();
        let values = vec![Value::Int32(1)];
        assert!(matches!(
            encode(&schema, &values),
            Err(StorageError::SchemaMismatch { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn rejects_varchar_over_max_len() {
        let schema = Schema {
            columns: vec![Column {
                name: "name".into(),
                ty: ColumnType::VarChar(3),
                nullable: false,
            }],
        };
        let values = vec![Value::VarChar("toolong".into())];
        assert!(matches!(
            encode(&schema, &values),
            Err(StorageError::Overflow { .. })
        ));
    }

    #[test]
    fn float64_round_trips_bit_identical() {
        let schema = Schema {
            columns: vec![Column {
                name: "x".into(),
                ty: ColumnType::Float64,
                nullable: false,
            }],
        };
        let values = vec![Value::Float64(f64::NAN)];
        let bytes = encode(&schema, &values).unwrap();
        let decoded = decode(&schema, &bytes).unwrap();
        match decoded[0] {
            Value::Float64(v) => assert_eq!(v.to_bits(), f64::NAN.to_bits()),
            _ => panic!("expected Float64"),
        }
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let schema = users_schema();
        let bytes = vec![0u8; 1];
        assert!(matches!(decode(&schema, &bytes), Err(StorageError::Truncated)));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let schema = Schema {
            columns: vec![Column {
                name: "name".into(),
                ty: ColumnType::VarChar(8),
                nullable: false,
            }],
        };
        let mut bytes = vec![0u8]; // null bitmap, nothing null
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        assert!(matches!(decode(&schema, &bytes), Err(StorageError::InvalidUtf8)));
    }
}
