/// 翻译服务与导出相关的常量配置
///
/// 该文件定义了所有翻译后端、批处理和导出的常量，方便统一管理和维护

/// 翻译后端API配置
pub mod api_config {
    /// 免费网页翻译接口
    pub const GOOGLE_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

    /// OpenAI Chat Completions 接口
    pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

    /// 默认模型
    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

    /// 可选模型
    pub const OPENAI_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-5.2"];

    /// 读取API密钥的环境变量
    pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
}

/// 翻译服务配置
pub mod service_config {
    /// 默认目标语言
    pub const DEFAULT_TARGET_LANG: &str = "en";

    /// 支持的语言代码
    pub const SUPPORTED_LANGUAGES: &[&str] = &[
        "af", "ar", "bg", "bn", "ca", "cs", "cy", "da", "de", "el", "en", "es", "et", "fa", "fi",
        "fr", "ga", "he", "hi", "hr", "hu", "id", "is", "it", "ja", "ko", "lt", "lv", "mk", "ms",
        "mt", "nl", "no", "pl", "pt", "ro", "ru", "sk", "sl", "sq", "sr", "sv", "th", "tl", "tr",
        "uk", "vi", "zh-CN", "zh-TW",
    ];

    /// LLM 每批翻译的条目数
    pub const LLM_BATCH_SIZE: usize = 10;

    /// 默认最大重试次数
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// 默认并发请求数量
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// 请求超时时间（秒）
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// LLM 请求超时时间（秒）
    pub const LLM_TIMEOUT_SECONDS: u64 = 60;

    /// 重试延迟基数（毫秒）
    pub const RETRY_DELAY_BASE_MS: u64 = 800;

    /// 重试间隔上限（毫秒）
    pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

    /// 翻译缓存默认存活时间（秒）
    pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 60 * 60;

    /// 翻译缓存最大条目数
    pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
}

/// 上下文翻译的标记符
pub mod context_markers {
    /// 单词前的标记
    pub const OPEN: &str = "||";

    /// 单词后的标记
    pub const CLOSE: &str = "|";
}

/// 模型价格（美元 / 百万 token），用于费用估算
pub mod pricing {
    /// (模型, 输入价格, 输出价格)
    pub const MODEL_PRICES: &[(&str, f64, f64)] = &[
        ("gpt-4o-mini", 0.15, 0.60),
        ("gpt-4o", 2.50, 10.00),
        ("gpt-5.2", 1.75, 14.00),
    ];

    /// 每条翻译请求的大致输入 token 数
    pub const INPUT_TOKENS_PER_ITEM: f64 = 120.0;

    /// 每条翻译结果的大致输出 token 数
    pub const OUTPUT_TOKENS_PER_ITEM: f64 = 15.0;
}

/// 实用工具函数
/// 验证API URL是否有效
pub fn is_valid_api_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.scheme() == "http" || parsed.scheme() == "https",
        Err(_) => false,
    }
}

/// 验证语言代码是否支持
pub fn is_supported_language(lang: &str) -> bool {
    service_config::SUPPORTED_LANGUAGES.contains(&lang)
}

/// 估算一次 OpenAI 翻译的费用，返回形如 `~$0.0012` 的字符串
///
/// 未知模型按最贵的价格估算
pub fn estimate_openai_cost(items: usize, model: &str) -> String {
    let (input_price, output_price) = pricing::MODEL_PRICES
        .iter()
        .find(|(name, _, _)| *name == model)
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or_else(|| {
            pricing::MODEL_PRICES
                .iter()
                .fold((0.0, 0.0), |acc, (_, i, o)| (acc.0.max(*i), acc.1.max(*o)))
        });

    let items = items as f64;
    let cost = items * pricing::INPUT_TOKENS_PER_ITEM * input_price / 1_000_000.0
        + items * pricing::OUTPUT_TOKENS_PER_ITEM * output_price / 1_000_000.0;

    format!("~${:.4}", cost)
}
