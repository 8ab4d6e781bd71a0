//! Row sum demo.
//!
//! Run with: `cargo run -p row-sum`
//! Set `RUST_LOG=adhesive_compiler=debug` to see the compiled source.

use std::sync::Arc;

use adhesive::{logging, AdhesiveConfig, AdhesiveContext, FunctionDefinition};
use arrow::array::{ArrayRef, Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::util::pretty::pretty_format_batches;
use tracing::info;

const SOURCE: &str = r#"
package demo;

// Sum of both columns; a missing bonus counts as zero.
unit RowSum -> i64 {
    let base = row.i64(0);
    let bonus = coalesce(row.i64(1), 0);
    if base < 0 { fail("negative base") } else { base + bonus }
}
"#;

fn main() -> adhesive::Result<()> {
    let config = AdhesiveConfig::new();
    logging::init(&config.logging);

    let context = AdhesiveContext::with_config(config)?;
    context.compile("demo.RowSum", SOURCE)?;
    let function = context.create_function(
        FunctionDefinition::Name("demo.RowSum".to_string()),
        vec![DataType::Int64, DataType::Int64],
        DataType::Int64,
    )?;

    let base: ArrayRef = Arc::new(Int64Array::from(vec![Some(100), Some(250), None, Some(75)]));
    let bonus: ArrayRef = Arc::new(Int64Array::from(vec![Some(10), None, Some(5), Some(25)]));
    let sum = function.invoke(&[base.clone(), bonus.clone()])?;

    let schema = Schema::new(vec![
        Field::new("base", DataType::Int64, true),
        Field::new("bonus", DataType::Int64, true),
        Field::new("sum", DataType::Int64, true),
    ]);
    let batch = RecordBatch::try_new(Arc::new(schema), vec![base, bonus, sum])?;
    println!("{}", pretty_format_batches(&[batch])?);

    let negative: ArrayRef = Arc::new(Int64Array::from(vec![-1]));
    let zero: ArrayRef = Arc::new(Int64Array::from(vec![0]));
    if let Err(err) = function.invoke(&[negative, zero]) {
        info!(event = "demo_failure", "{err}");
        println!("rejected: {err}");
    }
    Ok(())
}
