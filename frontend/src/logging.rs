//! 日志输出
//!
//! `log` 门面的控制台实现：wasm32 上写入浏览器控制台，其余平台写入 stderr。
//! 约定消息以组件前缀开头，如 `[Auth]`、`[Router]`、`[Analysis]`。

use log::{Level, LevelFilter, Log, Metadata, Record};

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        write_line(record.level(), &record.args().to_string());
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
fn write_line(level: Level, message: &str) {
    let value = wasm_bindgen::JsValue::from_str(message);
    match level {
        Level::Error => web_sys::console::error_1(&value),
        Level::Warn => web_sys::console::warn_1(&value),
        Level::Info => web_sys::console::log_1(&value),
        Level::Debug | Level::Trace => web_sys::console::debug_1(&value),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn write_line(level: Level, message: &str) {
    eprintln!("[{}] {}", level, message);
}

/// 安装全局 logger；重复调用时只更新级别
pub fn init(level: LevelFilter) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
