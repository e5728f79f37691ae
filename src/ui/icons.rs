//! Shared UI icons and emojis.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Output indicators
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");

// Experiment indicators
pub static PHONE: Emoji<'_, '_> = Emoji("📞 ", "[T]");
pub static HISTORY: Emoji<'_, '_> = Emoji("📜 ", "[H]");
pub static CONVERGED: Emoji<'_, '_> = Emoji("🎯 ", "[=]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static LEAF: Emoji<'_, '_> = Emoji("🌱 ", "[ENV]");
