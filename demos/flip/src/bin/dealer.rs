use clap::{value_parser, Arg, Command};
use commoncoin_codec::Encode;
use commoncoin_cryptography::{
    bls12381::{dealer::generate_shares, primitives::poly},
    utils::{hex, max_faults},
};
use rand::{rngs::StdRng, SeedableRng};

fn main() {
    // Parse arguments
    let matches = Command::new("dealer")
        .about("generate a threshold key set for the common coin")
        .arg(
            Arg::new("seed")
                .long("seed")
                .required(true)
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("n")
                .long("n")
                .required(true)
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("f")
                .long("f")
                .required(false)
                .value_parser(value_parser!(u32))
                .help("Faults tolerated (defaults to the maximum for n)"),
        )
        .get_matches();

    // Parse args
    let seed = *matches.get_one::<u64>("seed").expect("seed is required");
    let n = *matches.get_one::<u32>("n").expect("n is required");
    let f = matches
        .get_one::<u32>("f")
        .copied()
        .unwrap_or_else(|| max_faults(n));
    if f + 1 > n {
        panic!("f must be less than n");
    }

    // Generate secret
    let mut rng = StdRng::seed_from_u64(seed);
    let (polynomial, shares) = generate_shares(&mut rng, n, f + 1);

    // Log secret
    println!("polynomial: {}", hex(&polynomial.encode()));
    println!("public: {}", hex(&poly::public(&polynomial).encode()));
    for share in &shares {
        println!("share-{}: {}", share.index, hex(&share.encode()));
    }
}
