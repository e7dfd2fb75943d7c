use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use vocab_anki::api_constants::{estimate_openai_cost, service_config};
use vocab_anki::config::{BackendKind, Cli};
use vocab_anki::error::Warning;
use vocab_anki::stats::{
    format_duration, print_performance_stats, print_vocabulary_stats, summarize, RunTimings,
};
use vocab_anki::translator::{
    GoogleTranslator, LlmClient, OpenAiClient, TextTranslator, TranslationCache,
    TranslatorAdapter,
};
use vocab_anki::utils::{generate_output_path, init_logging, validate_input_file};
use vocab_anki::{exporter, extractor, pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    init_logging(cli.verbose, cli.quiet);

    // 验证输入文件
    validate_input_file(&cli.input)?;

    if let Err(e) = cli.validate() {
        error!("❌ 参数错误: {}", e);
        std::process::exit(2);
    }

    // 生成输出文件路径
    let output_path = generate_output_path(&cli.output, Local::now().date_naive());

    info!("🚀 开始转换生词本");
    info!("📂 输入文件: {}", cli.input.display());
    info!("📄 输出文件: {}", output_path.display());
    info!("🌐 目标语言: {}", cli.lang);

    // 开始性能计时
    let total_start = Instant::now();

    match convert(&cli, &output_path).await {
        Ok(timings) => {
            let total_duration = total_start.elapsed();
            info!(
                "✅ 导出完成！{} 行，总耗时: {}",
                timings.rows_exported,
                format_duration(total_duration)
            );

            if cli.stats {
                print_performance_stats(&timings, total_duration);
            }
        }
        Err(e) => {
            error!("❌ 转换失败: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// 转换核心函数：解析 → 流水线 → 导出 → 写文件
async fn convert(cli: &Cli, output_path: &Path) -> Result<RunTimings> {
    // 读取并解析数据库
    let extract_start = Instant::now();
    let raw = std::fs::read(&cli.input)
        .with_context(|| format!("读取文件失败: {}", cli.input.display()))?;
    let extraction = extractor::extract(&raw).await;
    let extract_time = extract_start.elapsed();

    if extraction.is_blocking() {
        anyhow::bail!("生词本中没有可用的记录: {}", cli.input.display());
    }
    info!("📚 提取到 {} 条查词记录", extraction.records.len());
    if let Some((first, last)) = extraction.records.date_range() {
        info!("📅 记录时间范围: {} 至 {}", first, last);
    }

    if cli.stats || cli.stats_json {
        let summary = summarize(&extraction.records);
        if cli.stats_json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("序列化统计数据失败")?
            );
        }
        if cli.stats {
            print_vocabulary_stats(&summary);
        }
    }

    let config = cli.pipeline_config()?;
    let spec = cli.export_spec()?;
    let (adapter, llm, cache) = build_translators(cli)?;

    if adapter.is_llm() {
        let planned = config.transform().apply(&extraction.records).len();
        info!(
            "💰 预计 OpenAI 费用: {} ({} 条, 模型: {})",
            estimate_openai_cost(planned, &cli.model),
            planned,
            cli.model
        );
    }

    // 翻译与标注
    let pipeline_start = Instant::now();
    let output = pipeline::run(&extraction.records, &config, &adapter, llm.as_deref()).await?;
    let pipeline_time = pipeline_start.elapsed();

    // 导出并写入文件
    let export_start = Instant::now();
    let exported = exporter::export(&output.table, &spec)?;
    std::fs::write(output_path, &exported.bytes)
        .with_context(|| format!("写入文件失败: {}", output_path.display()))?;
    let export_time = export_start.elapsed();

    let warnings: Vec<&Warning> = extraction
        .warnings
        .iter()
        .chain(&output.warnings)
        .chain(&exported.warnings)
        .collect();
    report_warnings(&warnings);

    Ok(RunTimings {
        extract_time,
        pipeline_time,
        export_time,
        records_extracted: extraction.records.len(),
        rows_exported: output.table.len(),
        output_size: exported.bytes.len(),
        cache_hits: cache.as_ref().map_or(0, |c| c.hits()),
        cache_misses: cache.as_ref().map_or(0, |c| c.misses()),
        warnings: warnings.len(),
    })
}

type Translators = (
    TranslatorAdapter,
    Option<Arc<dyn LlmClient>>,
    Option<Arc<TranslationCache>>,
);

/// 按命令行参数创建翻译后端
///
/// 密钥只保存在内存中的客户端里。缓存句柄一并返回，用于统计命中率
fn build_translators(cli: &Cli) -> Result<Translators> {
    let google: Arc<dyn TextTranslator> = Arc::new(GoogleTranslator::new(cli.max_retries)?);

    let needs_llm = cli.backend == BackendKind::OpenAi || cli.furigana;
    let llm = match cli.api_key.as_deref() {
        Some(key) if needs_llm => {
            let client: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(key, cli.max_retries)?);
            Some(client)
        }
        _ => None,
    };

    let mut adapter = match (cli.backend, &llm) {
        (BackendKind::OpenAi, Some(client)) => {
            TranslatorAdapter::llm(client.clone(), cli.model.as_str(), google)
        }
        _ => TranslatorAdapter::free(google),
    }
    .with_concurrency(cli.concurrency);

    let cache = (!cli.no_cache).then(|| {
        Arc::new(TranslationCache::new(
            Duration::from_secs(cli.cache_ttl),
            service_config::DEFAULT_CACHE_CAPACITY,
        ))
    });
    if let Some(cache) = &cache {
        adapter = adapter.with_cache(cache.clone());
    }

    debug!("翻译后端: {}", adapter.backend_name());
    Ok((adapter, llm, cache))
}

fn report_warnings(warnings: &[&Warning]) {
    if warnings.is_empty() {
        return;
    }
    warn!("⚠️  共 {} 条警告", warnings.len());
    for warning in warnings {
        debug!("   {}", warning);
    }
}
