use anyhow::Result;
use std::io::Write;

use crate::aggregate::PerfSymbolDetail;
use crate::analyzer::PerfSum;

/// Longest symbol text written to a cell.
pub const MAX_SYMBOL_LEN: usize = 1024;

pub const CSV_HEADERS: [&str; 21] = [
    "步骤/Step",
    "步骤名/Step Name",
    "事件/Event",
    "进程号/PID",
    "进程名/Process",
    "进程负载/Process Load",
    "线程号/TID",
    "线程名/Thread",
    "线程负载/Thread Load",
    "文件/File",
    "文件负载/File Load",
    "符号/Symbol",
    "符号自身负载/Symbol Load",
    "符号总负载/Symbol Total Load",
    "组件分类/Category",
    "分类名/Category Name",
    "子分类名/Sub Category",
    "主应用/Main App",
    "领域/Domain",
    "子系统/Sub System",
    "部件/Component",
];

/// Quote a field containing a comma, quote or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Spreadsheet tools evaluate a bare `toString` cell.
fn display_symbol(symbol: &str) -> String {
    if symbol == "toString" {
        return "toString()".to_string();
    }
    match symbol.char_indices().nth(MAX_SYMBOL_LEN) {
        Some((idx, _)) => symbol[..idx].to_string(),
        None => symbol.to_string(),
    }
}

fn format_row(step_name: &str, d: &PerfSymbolDetail) -> String {
    let fields = [
        d.step_id.to_string(),
        escape_field(step_name),
        d.event_kind.to_string(),
        d.process_id.to_string(),
        escape_field(&d.process_name),
        d.process_events.to_string(),
        d.thread_id.to_string(),
        escape_field(&d.thread_name),
        d.thread_events.to_string(),
        escape_field(&d.file),
        d.file_events.to_string(),
        escape_field(&display_symbol(&d.symbol)),
        d.symbol_events.to_string(),
        d.symbol_total_events.to_string(),
        d.component_category.to_string(),
        escape_field(&d.category_name),
        escape_field(&d.sub_category_name),
        u8::from(d.is_main_app).to_string(),
        escape_field(&d.domain),
        escape_field(&d.sub_system),
        escape_field(&d.component),
    ];
    fields.join(",")
}

/// Write one row per detail of every step.
pub fn write_detail_csv<W: Write>(out: &mut W, sum: &PerfSum) -> Result<()> {
    writeln!(out, "{}", CSV_HEADERS.join(","))?;
    for result in &sum.steps {
        for detail in &result.details {
            writeln!(out, "{}", format_row(&result.step.name, detail))?;
        }
    }
    Ok(())
}
