//! 压缩段 Batch 编解码
//!
//! 每个 batch 最多 [`BATCH_MAX_ROWS`] 行，按行编码后整体 LZ4 压缩：
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │ row_count    (u32 LE)            │
//! │ column_count (u32 LE)            │
//! │ uncomp_size  (u32 LE)            │
//! │ payload      (encoded + LZ4)     │
//! │ CRC32        (u32 LE)            │
//! └──────────────────────────────────┘
//! ```
//!
//! 值编码：`tag(u8)` + 负载；0=Null，1=Int(i64)，2=Text(u32 长度 + UTF-8)，3=Bytes(u32 长度 + 字节)。
//! 列名不进 payload，作为 batch 元数据保存，扫描时按列名投影；压缩形式导出时列名清单
//! 同样按长度前缀编码。

use std::io::{Cursor, Read};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crate::command::ColumnDef;
use crate::common::{HypercoreError, Result, Row, Value};

pub const BATCH_MAX_ROWS: usize = 1000;

const HEADER_LEN: usize = 12;

const TAG_NULL:  u8 = 0;
const TAG_INT:   u8 = 1;
const TAG_TEXT:  u8 = 2;
const TAG_BYTES: u8 = 3;

fn io_err(e: std::io::Error) -> HypercoreError {
    HypercoreError::Compression(e.to_string())
}

// ── 行编码 ────────────────────────────────────────────────────────────────────

fn encode_rows(rows: &[Row], width: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for row in rows {
        if row.len() != width {
            return Err(HypercoreError::Compression(format!(
                "row has {} values, expected {width}", row.len(),
            )));
        }
        for v in row {
            match v {
                Value::Null    => out.write_u8(TAG_NULL).map_err(io_err)?,
                Value::Int(x)  => {
                    out.write_u8(TAG_INT).map_err(io_err)?;
                    out.write_i64::<LittleEndian>(*x).map_err(io_err)?;
                }
                Value::Text(s) => {
                    out.write_u8(TAG_TEXT).map_err(io_err)?;
                    out.write_u32::<LittleEndian>(s.len() as u32).map_err(io_err)?;
                    out.extend_from_slice(s.as_bytes());
                }
                Value::Bytes(b) => {
                    out.write_u8(TAG_BYTES).map_err(io_err)?;
                    out.write_u32::<LittleEndian>(b.len() as u32).map_err(io_err)?;
                    out.extend_from_slice(b);
                }
            }
        }
    }
    Ok(out)
}

fn read_len_prefixed(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = cur.read_u32::<LittleEndian>().map_err(io_err)? as usize;
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf).map_err(io_err)?;
    Ok(buf)
}

fn decode_rows(raw: &[u8], count: usize, width: usize) -> Result<Vec<Row>> {
    let mut cur  = Cursor::new(raw);
    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let mut row = Vec::with_capacity(width);
        for _ in 0..width {
            let v = match cur.read_u8().map_err(io_err)? {
                TAG_NULL  => Value::Null,
                TAG_INT   => Value::Int(cur.read_i64::<LittleEndian>().map_err(io_err)?),
                TAG_TEXT  => {
                    let bytes = read_len_prefixed(&mut cur)?;
                    Value::Text(String::from_utf8(bytes)
                        .map_err(|e| HypercoreError::Compression(e.to_string()))?)
                }
                TAG_BYTES => Value::Bytes(read_len_prefixed(&mut cur)?),
                tag => return Err(HypercoreError::Compression(format!("unknown value tag {tag}"))),
            };
            row.push(v);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// 列名清单：`count(u32)` + 每列 `len(u32) + UTF-8`
fn encode_column_names(columns: &[String]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(columns.len() as u32).map_err(io_err)?;
    for name in columns {
        out.write_u32::<LittleEndian>(name.len() as u32).map_err(io_err)?;
        out.extend_from_slice(name.as_bytes());
    }
    Ok(out)
}

fn decode_column_names(raw: &[u8]) -> Result<Vec<String>> {
    let mut cur = Cursor::new(raw);
    let count   = cur.read_u32::<LittleEndian>().map_err(io_err)? as usize;
    let mut columns = Vec::with_capacity(count.min(raw.len()));
    for _ in 0..count {
        let bytes = read_len_prefixed(&mut cur)?;
        columns.push(String::from_utf8(bytes).map_err(|e| HypercoreError::Compression(e.to_string()))?);
    }
    if cur.position() as usize != raw.len() {
        return Err(HypercoreError::Compression("trailing bytes after column list".into()));
    }
    Ok(columns)
}

// ── CompressedBatch ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBatch {
    columns: Vec<String>,
    data:    Vec<u8>,
}

impl CompressedBatch {
    /// encode → LZ4 → 加 header + CRC
    pub fn build(columns: &[String], rows: &[Row]) -> Result<Self> {
        let encoded     = encode_rows(rows, columns.len())?;
        let compressed  = lz4::block::compress(&encoded, None, false)
            .map_err(|e| HypercoreError::Compression(e.to_string()))?;

        let mut data = Vec::with_capacity(HEADER_LEN + compressed.len() + 4);
        data.write_u32::<LittleEndian>(rows.len() as u32).map_err(io_err)?;
        data.write_u32::<LittleEndian>(columns.len() as u32).map_err(io_err)?;
        data.write_u32::<LittleEndian>(encoded.len() as u32).map_err(io_err)?;
        data.extend_from_slice(&compressed);

        let crc = crc32fast::hash(&data);
        data.write_u32::<LittleEndian>(crc).map_err(io_err)?;
        Ok(Self { columns: columns.to_vec(), data })
    }

    pub fn columns(&self) -> &[String] { &self.columns }

    pub fn row_count(&self) -> usize {
        let mut cur = Cursor::new(self.data.as_slice());
        cur.read_u32::<LittleEndian>().map(|n| n as usize).unwrap_or(0)
    }

    /// 校验 CRC 并解压出原始行（列顺序同 `columns()`）
    pub fn decode(&self) -> Result<Vec<Row>> {
        if self.data.len() < HEADER_LEN + 4 {
            return Err(HypercoreError::Compression("batch data too short".into()));
        }
        let payload_end = self.data.len() - 4;
        let stored_crc  = Cursor::new(&self.data[payload_end..])
            .read_u32::<LittleEndian>()
            .map_err(io_err)?;
        if stored_crc != crc32fast::hash(&self.data[..payload_end]) {
            return Err(HypercoreError::ChecksumMismatch);
        }

        let mut header = Cursor::new(&self.data[..HEADER_LEN]);
        let count       = header.read_u32::<LittleEndian>().map_err(io_err)? as usize;
        let width       = header.read_u32::<LittleEndian>().map_err(io_err)? as usize;
        let uncomp_size = header.read_u32::<LittleEndian>().map_err(io_err)?;
        if width != self.columns.len() {
            return Err(HypercoreError::Compression(format!(
                "batch has {width} columns, metadata lists {}", self.columns.len(),
            )));
        }

        let raw = lz4::block::decompress(&self.data[HEADER_LEN..payload_end], Some(uncomp_size as i32))
            .map_err(|e| HypercoreError::Compression(e.to_string()))?;
        decode_rows(&raw, count, width)
    }

    /// 按当前表结构投影：按列名取值，batch 中不存在的列取默认值
    pub fn project(&self, columns: &[ColumnDef]) -> Result<Vec<Row>> {
        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|c| self.columns.iter().position(|n| *n == c.name))
            .collect();

        Ok(self.decode()?
            .into_iter()
            .map(|row| {
                positions.iter().zip(columns)
                    .map(|(pos, col)| match pos {
                        Some(i) => row[*i].clone(),
                        None    => col.default.clone(),
                    })
                    .collect()
            })
            .collect())
    }

    /// 改写列名元数据；返回是否命中
    pub fn rename_column(&mut self, old: &str, new: &str) -> bool {
        match self.columns.iter_mut().find(|n| *n == old) {
            Some(name) => { *name = new.to_string(); true }
            None       => false,
        }
    }

    /// 删除一列：解码后去掉该列重建 batch；返回是否命中
    pub fn drop_column(&mut self, name: &str) -> Result<bool> {
        let Some(idx) = self.columns.iter().position(|n| n == name) else {
            return Ok(false);
        };
        let mut rows = self.decode()?;
        for row in &mut rows {
            row.remove(idx);
        }
        let mut columns = self.columns.clone();
        columns.remove(idx);
        *self = Self::build(&columns, &rows)?;
        Ok(true)
    }

    /// 以压缩形式导出的单行：`[row_count, 列名清单, data]`
    pub fn to_export_row(&self) -> Result<Row> {
        Ok(vec![
            Value::Int(self.row_count() as i64),
            Value::Bytes(encode_column_names(&self.columns)?),
            Value::Bytes(self.data.clone()),
        ])
    }

    /// `to_export_row` 的逆过程；数据先经 CRC 校验
    pub fn from_export_row(row: &Row) -> Result<Self> {
        let (columns, data) = match row.as_slice() {
            [Value::Int(_), Value::Bytes(cols), Value::Bytes(data)] => (cols, data),
            _ => return Err(HypercoreError::Compression("malformed compressed row".into())),
        };
        let batch = Self { columns: decode_column_names(columns)?, data: data.clone() };
        batch.decode()?;
        Ok(batch)
    }
}

/// 按 [`BATCH_MAX_ROWS`] 切分并压缩
pub fn compress_rows(columns: &[String], rows: &[Row]) -> Result<Vec<CompressedBatch>> {
    rows.chunks(BATCH_MAX_ROWS)
        .map(|chunk| CompressedBatch::build(columns, chunk))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn sample_rows(n: i64) -> Vec<Row> {
        (0..n)
            .map(|i| vec![Value::Int(i), Value::Text(format!("dev-{}", i % 3)), Value::Null])
            .collect()
    }

    #[test]
    fn build_and_decode() {
        let rows  = sample_rows(10);
        let batch = CompressedBatch::build(&cols(&["time", "device", "note"]), &rows).unwrap();
        assert_eq!(batch.row_count(), 10);
        assert_eq!(batch.decode().unwrap(), rows);
    }

    #[test]
    fn corrupted_batch_fails_checksum() {
        let mut batch = CompressedBatch::build(&cols(&["time", "device", "note"]), &sample_rows(4)).unwrap();
        let mid = batch.data.len() / 2;
        batch.data[mid] ^= 0xFF;
        assert!(matches!(batch.decode(), Err(HypercoreError::ChecksumMismatch)));
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let err = CompressedBatch::build(&cols(&["a"]), &[vec![Value::Int(1), Value::Int(2)]]);
        assert!(matches!(err, Err(HypercoreError::Compression(_))));
    }

    #[test]
    fn compress_rows_splits_into_batches() {
        let batches = compress_rows(&cols(&["time", "device", "note"]), &sample_rows(2500)).unwrap();
        let counts: Vec<usize> = batches.iter().map(CompressedBatch::row_count).collect();
        assert_eq!(counts, vec![1000, 1000, 500]);
    }

    #[test]
    fn project_follows_renames_drops_and_defaults() {
        let mut batch = CompressedBatch::build(
            &cols(&["time", "device", "note"]),
            &[vec![Value::Int(7), Value::Text("a".into()), Value::Null]],
        ).unwrap();
        assert!(batch.rename_column("device", "sensor"));
        assert!(!batch.rename_column("missing", "x"));

        let target = vec![
            ColumnDef::new("time"),
            ColumnDef::new("sensor"),
            ColumnDef::new("added").with_default(Value::Int(0)),
        ];
        assert_eq!(
            batch.project(&target).unwrap(),
            vec![vec![Value::Int(7), Value::Text("a".into()), Value::Int(0)]],
        );
    }

    #[test]
    fn export_row_restores_batch() {
        let batch = CompressedBatch::build(&cols(&["time", "device", "note"]), &sample_rows(3)).unwrap();
        let row = batch.to_export_row().unwrap();
        assert_eq!(row[0], Value::Int(3));
        assert_eq!(CompressedBatch::from_export_row(&row).unwrap(), batch);
        assert!(CompressedBatch::from_export_row(&vec![Value::Null]).is_err());
    }

    #[test]
    fn export_row_keeps_column_names_with_commas() {
        let batch = CompressedBatch::build(&cols(&["time", "a,b"]), &[vec![Value::Int(1), Value::Int(2)]]).unwrap();
        let restored = CompressedBatch::from_export_row(&batch.to_export_row().unwrap()).unwrap();
        assert_eq!(restored.columns(), ["time", "a,b"]);
        assert_eq!(restored.decode().unwrap(), vec![vec![Value::Int(1), Value::Int(2)]]);
    }

    #[test]
    fn drop_column_removes_values_from_batch() {
        let mut batch = CompressedBatch::build(
            &cols(&["time", "value"]),
            &[vec![Value::Int(1), Value::Int(42)]],
        ).unwrap();
        assert!(batch.drop_column("value").unwrap());
        assert!(!batch.drop_column("value").unwrap());
        assert_eq!(batch.columns(), ["time"]);

        // 同名列重新加回后取默认值，而不是旧数据
        let target = vec![ColumnDef::new("time"), ColumnDef::new("value")];
        assert_eq!(batch.project(&target).unwrap(), vec![vec![Value::Int(1), Value::Null]]);
    }
}
