use anyhow::Result;
use arrow::array::{
    ArrayRef, Float32Array, Float32Builder, Float64Array, Float64Builder, Int64Array, Int64Builder,
    ListBuilder, RecordBatch, StringArray, StringBuilder, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use log::info;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{Field as RecordField, Record};
use crate::types::{ArrayData, Primitive, TypeTag};

/// Arrow element type used for a DMAP type tag.
fn element_type(tag: TypeTag) -> DataType {
    match tag {
        TypeTag::Float => DataType::Float32,
        TypeTag::Double => DataType::Float64,
        TypeTag::String => DataType::Utf8,
        _ => DataType::Int64,
    }
}

fn list_of(data_type: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", data_type, true)))
}

/// Path of the `index`-th chunk file inside `dir`.
pub fn part_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("file_part{:03}.parquet", index))
}

pub struct ParquetFormatter {
    output_directory: String,
    chunk_size: usize,
}

impl ParquetFormatter {
    pub fn new(output_directory: String, chunk_size: usize) -> Self {
        Self {
            output_directory,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn convert(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            anyhow::bail!("No records to write to Parquet");
        }

        create_dir_all(&self.output_directory)?;

        let total_chunks = records.len().div_ceil(self.chunk_size);
        info!(
            "Generated a total of {} chunks, will now create that total amount of files.",
            total_chunks
        );

        for (i, chunk) in records.chunks(self.chunk_size).enumerate() {
            info!("Writing chunk {}/{}, {} rows", i + 1, total_chunks, chunk.len());

            let output_path = part_path(Path::new(&self.output_directory), i);

            self.write_chunk_to_parquet(chunk, i * self.chunk_size, &output_path)?;
        }

        info!("All chunks have been written");
        Ok(())
    }

    fn write_chunk_to_parquet(&self, records: &[Record], first_index: usize, output_path: &Path) -> Result<()> {
        let (columns, column_types) = self.infer_schema_single_pass(records);

        let mut fields = vec![
            Field::new("record_index", DataType::UInt32, false),
            Field::new("byte_len", DataType::Int64, true),
        ];
        for name in &columns {
            fields.push(Field::new(name.as_str(), column_types[name].clone(), true));
        }
        let schema = Arc::new(Schema::new(fields));

        let indices: Vec<u32> = (0..records.len()).map(|i| (first_index + i) as u32).collect();
        let byte_lens: Vec<Option<i64>> = records.iter().map(|r| r.byte_len().map(|n| n as i64)).collect();

        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from(indices)),
            Arc::new(Int64Array::from(byte_lens)),
        ];
        for name in &columns {
            arrays.push(self.build_typed_array(records, name, &column_types[name])?);
        }

        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let file = File::create(output_path)?;
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }

    /// Column names in first-seen order, typed by the first record holding each.
    fn infer_schema_single_pass(&self, records: &[Record]) -> (Vec<String>, HashMap<String, DataType>) {
        let mut column_types = HashMap::new();
        let mut column_order = Vec::new();

        for record in records {
            for field in record.fields() {
                if column_types.contains_key(field.name()) {
                    continue;
                }
                let element = element_type(field.tag());
                let data_type = if field.is_array() { list_of(element) } else { element };
                column_types.insert(field.name().to_string(), data_type);
                column_order.push(field.name().to_string());
            }
        }

        (column_order, column_types)
    }

    fn build_typed_array(&self, records: &[Record], name: &str, data_type: &DataType) -> Result<ArrayRef> {
        let scalar = |r: &Record| match r.get(name) {
            Some(RecordField::Scalar(s)) => Some(s.value().clone()),
            _ => None,
        };
        let array = |r: &Record| match r.get(name) {
            Some(RecordField::Array(a)) => Some(a.data().clone()),
            _ => None,
        };

        let built: ArrayRef = match data_type {
            DataType::Int64 => Arc::new(Int64Array::from(
                records.iter().map(|r| scalar(r).and_then(|p| p.as_i64())).collect::<Vec<_>>(),
            )),
            DataType::Float32 => Arc::new(Float32Array::from(
                records
                    .iter()
                    .map(|r| match scalar(r) {
                        Some(Primitive::Float(v)) => Some(v),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            DataType::Float64 => Arc::new(Float64Array::from(
                records.iter().map(|r| scalar(r).and_then(|p| p.as_f64())).collect::<Vec<_>>(),
            )),
            DataType::Utf8 => Arc::new(StringArray::from(
                records
                    .iter()
                    .map(|r| match scalar(r) {
                        Some(Primitive::String(s)) => Some(s),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            DataType::List(item) => match item.data_type() {
                DataType::Float32 => {
                    let mut builder = ListBuilder::new(Float32Builder::new());
                    for record in records {
                        match array(record) {
                            Some(ArrayData::Float(values)) => {
                                builder.values().append_slice(&values);
                                builder.append(true);
                            }
                            _ => builder.append(false),
                        }
                    }
                    Arc::new(builder.finish())
                }
                DataType::Float64 => {
                    let mut builder = ListBuilder::new(Float64Builder::new());
                    for record in records {
                        match array(record).and_then(|data| data.to_f64_vec()) {
                            Some(values) => {
                                builder.values().append_slice(&values);
                                builder.append(true);
                            }
                            None => builder.append(false),
                        }
                    }
                    Arc::new(builder.finish())
                }
                DataType::Utf8 => {
                    let mut builder = ListBuilder::new(StringBuilder::new());
                    for record in records {
                        match array(record) {
                            Some(ArrayData::String(values)) => {
                                for value in values {
                                    builder.values().append_value(value);
                                }
                                builder.append(true);
                            }
                            _ => builder.append(false),
                        }
                    }
                    Arc::new(builder.finish())
                }
                _ => {
                    let mut builder = ListBuilder::new(Int64Builder::new());
                    for record in records {
                        match array(record) {
                            Some(data) if !matches!(data.tag(), TypeTag::Float | TypeTag::Double | TypeTag::String) => {
                                for i in 0..data.len() {
                                    builder.values().append_option(data.get(i).and_then(|p| p.as_i64()));
                                }
                                builder.append(true);
                            }
                            _ => builder.append(false),
                        }
                    }
                    Arc::new(builder.finish())
                }
            },
            other => anyhow::bail!("Unsupported column type {:?} for '{}'", other, name),
        };
        Ok(built)
    }
}
