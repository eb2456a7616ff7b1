use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 没有匹配策略的申请如何处理
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnsupportedSitePolicy {
    /// 保持 queued，下一轮还会被选中
    #[default]
    LeaveQueued,
    /// 标记为 failed 并写明原因
    MarkFailed,
}

impl FromStr for UnsupportedSitePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leave_queued" | "leave-queued" => Ok(Self::LeaveQueued),
            "mark_failed" | "mark-failed" => Ok(Self::MarkFailed),
            other => Err(format!("未知的策略: {}", other)),
        }
    }
}

impl fmt::Display for UnsupportedSitePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeaveQueued => write!(f, "leave_queued"),
            Self::MarkFailed => write!(f, "mark_failed"),
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 轮询间隔（秒）
    pub poll_interval_secs: u64,
    /// 同时执行的申请数量
    pub max_concurrent_applications: usize,
    /// 最多运行几轮，`None` 表示一直运行
    pub max_cycles: Option<u64>,
    // --- 浏览器配置 ---
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    /// cookie 文件目录
    pub cookies_dir: PathBuf,
    pub persist_storage_state: bool,
    // --- 策略配置 ---
    pub max_apply_steps: usize,
    pub step_delay_ms: u64,
    pub login_timeout_secs: u64,
    /// 单条申请的超时（秒），默认不限制
    pub item_timeout_secs: Option<u64>,
    pub unsupported_site_policy: UnsupportedSitePolicy,
    // --- 数据 ---
    /// 种子数据 TOML
    pub seed_file: PathBuf,
    /// 存储快照文件，不设置则只保存在内存
    pub store_snapshot: Option<PathBuf>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LinkedIn 凭据 ---
    pub linkedin_username: Option<String>,
    pub linkedin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            max_concurrent_applications: 1,
            max_cycles: None,
            headless: true,
            chrome_executable: None,
            cookies_dir: PathBuf::from("cookies"),
            persist_storage_state: true,
            max_apply_steps: 10,
            step_delay_ms: 2000,
            login_timeout_secs: 15,
            item_timeout_secs: None,
            unsupported_site_policy: UnsupportedSitePolicy::LeaveQueued,
            seed_file: PathBuf::from("seed.toml"),
            store_snapshot: None,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            linkedin_username: None,
            linkedin_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 按键取值构造配置，取不到或解析失败时使用默认值
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let parsed = |key: &str| Parsed(lookup(key));
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            poll_interval_secs: parsed("POLL_INTERVAL_SECS").get().unwrap_or(default.poll_interval_secs),
            max_concurrent_applications: parsed("MAX_CONCURRENT_APPLICATIONS").get()
                .filter(|n: &usize| *n > 0)
                .unwrap_or(default.max_concurrent_applications),
            max_cycles: parsed("MAX_CYCLES").get().or(default.max_cycles),
            headless: parsed("HEADLESS").get().unwrap_or(default.headless),
            chrome_executable: text("CHROME_EXECUTABLE").map(PathBuf::from).or(default.chrome_executable),
            cookies_dir: text("COOKIES_DIR").map(PathBuf::from).unwrap_or(default.cookies_dir),
            persist_storage_state: parsed("PERSIST_STORAGE_STATE").get().unwrap_or(default.persist_storage_state),
            max_apply_steps: parsed("MAX_APPLY_STEPS").get().unwrap_or(default.max_apply_steps),
            step_delay_ms: parsed("STEP_DELAY_MS").get().unwrap_or(default.step_delay_ms),
            login_timeout_secs: parsed("LOGIN_TIMEOUT_SECS").get().unwrap_or(default.login_timeout_secs),
            item_timeout_secs: parsed("ITEM_TIMEOUT_SECS").get().or(default.item_timeout_secs),
            unsupported_site_policy: parsed("UNSUPPORTED_SITE_POLICY").get().unwrap_or(default.unsupported_site_policy),
            seed_file: text("SEED_FILE").map(PathBuf::from).unwrap_or(default.seed_file),
            store_snapshot: text("STORE_SNAPSHOT").map(PathBuf::from).or(default.store_snapshot),
            verbose_logging: parsed("VERBOSE_LOGGING").get().unwrap_or(default.verbose_logging),
            output_log_file: text("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            linkedin_username: text("LINKEDIN_USERNAME").or(default.linkedin_username),
            linkedin_password: text("LINKEDIN_PASSWORD").or(default.linkedin_password),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_secs.map(Duration::from_secs)
    }
}

/// 环境变量原始值，按目标类型解析
struct Parsed(Option<String>);

impl Parsed {
    fn get<T: FromStr>(self) -> Option<T> {
        self.0.and_then(|v| v.trim().parse().ok())
    }
}
