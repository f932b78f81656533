//! Runs a simulation locally and draws the grid to the console each tick.

use rand::rngs::StdRng;
use rand::SeedableRng;
use robovac::GridMap;
use std::{env, fs, thread, time::Duration};

fn main() {
    let path = env::args().nth(1).expect("usage: watch <map-file>");
    let contents = fs::read_to_string(&path).expect("could not read map file");

    let mut map = GridMap::parse(&contents);
    let mut rng = StdRng::from_entropy();

    map.draw();

    while !map.is_complete() {
        if let Err(err) = map.advance(&mut rng) {
            eprintln!("{err}");
            return;
        }

        map.draw();
        thread::sleep(Duration::from_millis(200));
    }

    println!("cleaned {} spaces", map.spaces_cleaned());
}
