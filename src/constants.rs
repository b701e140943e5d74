/// 新建记录的初始评分（不能为 0：评分会出现在对数比值的分母中）
pub const INITIAL_RATING: f64 = 0.01;

/// 新建记录的初始不确定度（最大值）
pub const INITIAL_UNCERTAINTY: f64 = 1.0;

/// 场景默认时间上限（毫秒）
pub const DEFAULT_TIME_LIMIT_MS: f64 = 90_000.0;

/// 概率合法区间下界，目标分布采样值会被夹到此区间内
pub const DISTR_LOWER_LIMIT: f64 = 0.001;

/// 概率合法区间上界
pub const DISTR_UPPER_LIMIT: f64 = 0.999;

/// 评分差为 0 时的替代值，避免期望得分公式除零
pub const ZERO_DIFF_SUBSTITUTE: f64 = 0.001;

/// 拒绝采样最大重试次数，超过后回退到最近的边界
pub const MAX_SAMPLING_ATTEMPTS: u32 = 100;

/// 计算得到的 K 因子下限，保证 K > 0
pub const MIN_K_FACTOR: f64 = 1e-6;

/// 目标成功概率分布默认值
pub const DEFAULT_TARGET_MEAN: f64 = 0.75;
pub const DEFAULT_TARGET_SD: f64 = 0.1;
pub const DEFAULT_TARGET_LOWER_LIMIT: f64 = 0.5;
pub const DEFAULT_TARGET_UPPER_LIMIT: f64 = 1.0;

/// 模糊区间外带标准差倍数
pub const DEFAULT_FI_SD_MULTIPLIER: f64 = 1.0;

/// 不确定度模型：最长空闲天数 / 不确定度归零所需游玩次数
pub const DEFAULT_MAX_DELAY_DAYS: f64 = 30.0;
pub const DEFAULT_MAX_PLAY: f64 = 40.0;

/// K 因子参数
pub const DEFAULT_K_CONST: f64 = 0.0075;
pub const DEFAULT_K_UP: f64 = 4.0;
pub const DEFAULT_K_DOWN: f64 = 0.5;

/// 校准期参数（仅限时适配器）
pub const DEFAULT_PLAYER_CAL_LENGTH: u32 = 30;
pub const DEFAULT_SCENARIO_CAL_LENGTH: u32 = 30;
pub const DEFAULT_PLAYER_CAL_K: f64 = 0.1;
pub const DEFAULT_SCENARIO_CAL_K: f64 = 0.1;

/// 仅准确率适配器的期望得分放大底数与步长
pub const DEFAULT_EXPECT_SCORE_MAGNIFIER: f64 = 10.0;
pub const DEFAULT_MAGNIFIER_STEP_SIZE: f64 = 2.302573;

/// 记录持久化时间戳格式（可排序）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 每天毫秒数
pub const MILLIS_PER_DAY: i64 = 86_400_000;
