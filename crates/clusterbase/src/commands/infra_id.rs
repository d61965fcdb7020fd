pub fn handle(base: &str, max_len: usize, random_len: usize) {
    println!("{}", clusterbase::generate_infra_id(base, max_len, random_len));
}
