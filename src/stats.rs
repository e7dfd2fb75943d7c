//! 生词统计
//!
//! 把记录集汇总为时间序列和分类频次表，供控制台报告或 JSON 输出使用。
//! 图表绘制不在这里。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use crate::records::RecordSet;

/// 每月查词数量及累计值
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
    pub cumulative: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

/// 汇总统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_records: usize,
    pub distinct_books: usize,
    pub distinct_languages: usize,
    pub active_days: usize,
    pub average_per_active_day: f64,
    pub longest_streak: usize,
    pub most_frequent_book: Option<String>,
    /// 按月份升序
    pub per_month: Vec<MonthCount>,
    /// 按日期升序
    pub per_day: Vec<DayCount>,
    /// 按数量降序，数量相同按名称升序
    pub per_language: Vec<CategoryCount>,
    pub per_book: Vec<CategoryCount>,
}

impl Stats {
    /// 前 `n` 本查词最多的书
    pub fn top_books(&self, n: usize) -> &[CategoryCount] {
        &self.per_book[..n.min(self.per_book.len())]
    }
}

pub fn summarize(records: &RecordSet) -> Stats {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut per_month: BTreeMap<String, usize> = BTreeMap::new();
    let mut per_language: HashMap<&str, usize> = HashMap::new();
    let mut per_book: HashMap<&str, usize> = HashMap::new();

    for record in records {
        *per_day.entry(record.date()).or_default() += 1;
        *per_month
            .entry(record.timestamp.format("%Y-%m").to_string())
            .or_default() += 1;
        *per_language.entry(record.word_language.as_str()).or_default() += 1;
        *per_book.entry(record.book_title.as_str()).or_default() += 1;
    }

    let days: Vec<NaiveDate> = per_day.keys().copied().collect();
    let active_days = days.len();
    let total_records = records.len();

    let mut cumulative = 0;
    let per_month = per_month
        .into_iter()
        .map(|(month, count)| {
            cumulative += count;
            MonthCount {
                month,
                count,
                cumulative,
            }
        })
        .collect();

    let per_book = ranked(per_book);
    let per_language = ranked(per_language);

    Stats {
        total_records,
        distinct_books: per_book.len(),
        distinct_languages: per_language.len(),
        active_days,
        average_per_active_day: if active_days == 0 {
            0.0
        } else {
            total_records as f64 / active_days as f64
        },
        longest_streak: longest_streak(&days),
        most_frequent_book: per_book.first().map(|c| c.name.clone()),
        per_month,
        per_day: per_day
            .into_iter()
            .map(|(date, count)| DayCount { date, count })
            .collect(),
        per_language,
        per_book,
    }
}

fn ranked(counts: HashMap<&str, usize>) -> Vec<CategoryCount> {
    let mut out: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(name, count)| CategoryCount {
            name: name.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    out
}

/// 最长连续活跃天数
///
/// 相隔恰好一天延续连续记录，间隔更大则重新从1开始计数。输入可以无序、可以重复。
pub fn longest_streak(dates: &[NaiveDate]) -> usize {
    let days: BTreeSet<NaiveDate> = dates.iter().copied().collect();

    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;

    for day in days {
        current = match previous {
            Some(prev) if (day - prev).num_days() == 1 => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(day);
    }
    longest
}

/// 打印生词统计报告
pub fn print_vocabulary_stats(stats: &Stats) {
    println!("\n📊 生词统计报告:");
    println!("═══════════════════════════════════════");

    println!("📚 总览:");
    println!("   查词总数: {} 条", stats.total_records);
    println!("   书籍数量: {} 本", stats.distinct_books);
    println!("   语言数量: {} 种", stats.distinct_languages);

    println!("\n📅 活跃度:");
    println!("   活跃天数: {} 天", stats.active_days);
    println!("   日均查词: {:.1} 条", stats.average_per_active_day);
    println!("   最长连续: {} 天", stats.longest_streak);

    if stats.most_frequent_book.is_some() {
        println!("\n🏆 查词最多的书:");
        for (rank, entry) in stats.top_books(5).iter().enumerate() {
            println!("   {}. {} ({} 条)", rank + 1, display_name(&entry.name), entry.count);
        }
    }

    if !stats.per_language.is_empty() {
        println!("\n🌐 语言分布:");
        for entry in &stats.per_language {
            println!("   {}: {} 条", display_name(&entry.name), entry.count);
        }
    }

    if !stats.per_month.is_empty() {
        println!("\n📈 每月查词:");
        for month in &stats.per_month {
            println!(
                "   {}: {} 条 (累计 {})",
                month.month, month.count, month.cumulative
            );
        }
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "(未知)"
    } else {
        name
    }
}

/// 一次运行中各阶段的耗时
#[derive(Debug, Default)]
pub struct RunTimings {
    pub extract_time: Duration,
    pub pipeline_time: Duration,
    pub export_time: Duration,
    pub records_extracted: usize,
    pub rows_exported: usize,
    pub output_size: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub warnings: usize,
}

impl RunTimings {
    /// 缓存命中率，没有查询过缓存时为 None
    pub fn cache_hit_rate(&self) -> Option<f64> {
        let lookups = self.cache_hits + self.cache_misses;
        (lookups > 0).then(|| self.cache_hits as f64 / lookups as f64)
    }
}

/// 打印性能统计
pub fn print_performance_stats(timings: &RunTimings, total_duration: Duration) {
    println!("\n⏱️  性能统计报告:");
    println!("═══════════════════════════════════════");
    println!("   数据库解析: {}", format_duration(timings.extract_time));
    println!("   翻译与标注: {}", format_duration(timings.pipeline_time));
    println!("   表格导出: {}", format_duration(timings.export_time));
    println!("   总耗时: {}", format_duration(total_duration));

    println!("\n📏 数据统计:");
    println!("   提取记录: {} 条", timings.records_extracted);
    println!("   导出行数: {} 行", timings.rows_exported);
    println!(
        "   输出大小: {} 字节 ({:.1} KB)",
        timings.output_size,
        timings.output_size as f64 / 1024.0
    );
    println!("   警告: {} 条", timings.warnings);

    // 缓存统计
    if let Some(cache_hit_rate) = timings.cache_hit_rate() {
        println!("\n💾 缓存统计:");
        println!("   缓存命中: {} 次", timings.cache_hits);
        println!("   缓存未命中: {} 次", timings.cache_misses);
        println!("   命中率: {:.1}%", cache_hit_rate * 100.0);
    }
}

/// 格式化持续时间
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
