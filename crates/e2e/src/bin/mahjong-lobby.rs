//! Four players at a fresh table, no feature flags.

use mahjong_e2e::Scenario;

fn main() {
    mahjong_e2e::cli::main(Scenario::Lobby)
}
