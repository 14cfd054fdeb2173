//! 分配耗时统计与日志

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// 每次 `determine_path_assignments` 的耗时（毫秒）
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AssignmentDurations {
    durations_ms: Vec<f64>,
}

impl AssignmentDurations {
    pub fn record(&mut self, elapsed: Duration) {
        self.durations_ms.push(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn len(&self) -> usize {
        self.durations_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations_ms.is_empty()
    }

    /// 无记录时为 0
    pub fn average_ms(&self) -> f64 {
        if self.durations_ms.is_empty() {
            return 0.0;
        }
        self.durations_ms.iter().sum::<f64>() / self.durations_ms.len() as f64
    }
}

/// 以 `平均耗时,已分配数\r\n` 的行格式写出统计
pub struct AssignmentsDurationLogger {
    sink: Option<Box<dyn Write + Send>>,
    enabled: bool,
    rows: usize,
}

impl std::fmt::Debug for AssignmentsDurationLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentsDurationLogger")
            .field("has_sink", &self.sink.is_some())
            .field("enabled", &self.enabled)
            .field("rows", &self.rows)
            .finish()
    }
}

impl Default for AssignmentsDurationLogger {
    fn default() -> Self {
        Self::disabled()
    }
}

impl AssignmentsDurationLogger {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Some(sink),
            enabled: true,
            rows: 0,
        }
    }

    /// 创建（截断）日志文件
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn disabled() -> Self {
        Self {
            sink: None,
            enabled: false,
            rows: 0,
        }
    }

    pub fn set_info_saving_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.sink.is_some()
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// 关闭或没有输出目标时什么也不做
    pub fn save_info(&mut self, average_duration_ms: f64, num_assigned: usize) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        write!(sink, "{:?},{}\r\n", average_duration_ms, num_assigned)?;
        sink.flush()?;
        self.rows += 1;
        Ok(())
    }
}
