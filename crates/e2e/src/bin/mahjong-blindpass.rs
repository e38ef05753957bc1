//! Four players with BLIND_PASS_ALL=1, for Charleston passes by hand.

use mahjong_e2e::Scenario;

fn main() {
    mahjong_e2e::cli::main(Scenario::BlindPass)
}
