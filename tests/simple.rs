use std::{fs::File, io::BufReader, path::Path, time::Duration};

use tsp_lab::{construct::nearest_neighbor, HeldKarp, Instance, Solver};

#[test]
fn main() {
    let f = File::open(Path::new("tests/data/sample.tsp")).unwrap();
    let t = Instance::from_reader(BufReader::new(f)).unwrap();
    assert_eq!(t.n(), 10);

    let opt = HeldKarp::default().solve(&t).unwrap();
    let mut s = Solver::new(&t, Duration::from_secs(2), 4234).with_max_iterations(200);
    s.run();

    let sol = s.solution();
    assert!(sol.is_valid());
    assert!(sol.cost() >= opt.tour.cost() - 1e-9);
    assert!(sol.cost() <= nearest_neighbor(&t, 0).cost());
}
