use ddh_psi_sum::{plaintext_intersection_sum, run_protocol, Error};

fn main() -> Result<(), Error> {
    // RUST_LOG=debug shows the rounds
    pretty_env_logger::init();

    // Party1's identifiers
    let set_v = ["apple", "banana", "cherry", "date"];

    // Party2's identifiers with their values
    let set_w = [("apple", 10), ("banana", 20), ("grape", 30), ("date", 40)];

    let output = run_protocol(&set_v, &set_w)?;
    println!("intersection size: {}", output.intersection_size);
    println!("intersection sum:  {}", output.intersection_sum);

    // sanity check against the clear computation
    let expected = plaintext_intersection_sum(&set_v, &set_w);
    assert_eq!(output, expected);

    Ok(())
}
