//! Four players with SKIP_CHARLESTON=1; play starts as soon as everyone is seated.

use mahjong_e2e::Scenario;

fn main() {
    mahjong_e2e::cli::main(Scenario::Gameplay)
}
