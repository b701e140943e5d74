pub const PLAYERS: &str = "players";
pub const SCENARIOS: &str = "scenarios";
pub const GAMEPLAY_LOGS: &str = "gameplay_logs";
