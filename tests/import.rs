use customer_importer::{import_customers, ImportOptions, PipelineConfig, TallyError};
use std::io::Write;
use tempfile::NamedTempFile;

fn customers_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "first_name,last_name,email,gender,ip_address").unwrap();
    writeln!(file, "Deborah,Moreno,dmorenohn@yahoo.com,Female,198.222.187.18").unwrap();
    writeln!(file, "Christina,Vasquez,cvasquezl0@zdnet.com,Female,91.236.117.57").unwrap();
    writeln!(file, "Phyllis,Lawrence,plawrence7x@yahoo.com,Female,48.210.189.102").unwrap();
    writeln!(file, "Willie,Ford,wford96@yahoo.com,Male,224.244.143.184").unwrap();
    writeln!(file, "Jane,Cunningham,jcunninghamcu@zdnet.com,Female,127.9.53.198").unwrap();
    writeln!(file, "Jonathan,Meyer,jmeyerj2@yahoo.com,Male,202.58.253.34").unwrap();
    writeln!(file, "Randy,Nichols,rnicholsdi@zdnet.com,Male,234.51.144.226").unwrap();
    writeln!(file, "Sandra,Gilbert,sgilbertk3@yahoo.com,Female,83.6.172.127").unwrap();
    file.flush().unwrap();
    file
}

fn options(workers: usize) -> ImportOptions {
    ImportOptions {
        pipeline: PipelineConfig::default().with_workers(workers),
        ..ImportOptions::default()
    }
}

#[test]
fn counts_domains_and_drops_header() {
    let file = customers_file();
    let tally = import_customers(file.path(), &options(3)).unwrap();

    assert_eq!(tally.as_pairs(), vec![("yahoo.com", 5), ("zdnet.com", 3)]);
    assert_eq!(tally.malformed, 1);
}

#[test]
fn sequential_and_concurrent_agree() {
    let file = customers_file();
    let concurrent = import_customers(file.path(), &options(2)).unwrap();
    let sequential = import_customers(
        file.path(),
        &ImportOptions {
            sequential: true,
            ..ImportOptions::default()
        },
    )
    .unwrap();
    assert_eq!(concurrent, sequential);
}

#[test]
fn large_input_on_a_small_pool() {
    let mut file = NamedTempFile::new().unwrap();
    let domains = ["alpha.io", "beta.org", "gamma.net", "Delta.com"];
    for i in 0..200_000u32 {
        let domain = domains[(i % 4) as usize];
        writeln!(file, "first{i},last{i},user{i}@{domain},Female,10.0.0.{}", i % 255).unwrap();
    }
    file.flush().unwrap();

    let small = ImportOptions {
        pipeline: PipelineConfig::default()
            .with_workers(1)
            .with_batch_size(16)
            .with_queue_capacity(2),
        ..ImportOptions::default()
    };
    let tally = import_customers(file.path(), &small).unwrap();

    assert_eq!(
        tally.as_pairs(),
        vec![
            ("Delta.com", 50_000),
            ("alpha.io", 50_000),
            ("beta.org", 50_000),
            ("gamma.net", 50_000),
        ]
    );
    assert_eq!(tally.records, 200_000);

    for workers in [2, 4, 8] {
        assert_eq!(import_customers(file.path(), &options(workers)).unwrap(), tally);
    }
}

#[test]
fn output_is_strictly_increasing() {
    let mut file = NamedTempFile::new().unwrap();
    for i in (0..500u32).rev() {
        writeln!(file, "x,y,u@host{}.example,z", i % 97).unwrap();
        writeln!(file, "no email here").unwrap();
    }
    file.flush().unwrap();

    let tally = import_customers(file.path(), &options(4)).unwrap();
    assert!(tally
        .domains
        .windows(2)
        .all(|pair| pair[0].domain.as_bytes() < pair[1].domain.as_bytes()));
    assert!(tally.domains.iter().all(|entry| !entry.domain.is_empty()));
    assert_eq!(tally.domains.iter().map(|entry| entry.count).sum::<u64>(), 500);
    assert_eq!(tally.malformed, 500);
}

#[test]
fn unreadable_path_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("customers.csv");
    let err = import_customers(&missing, &options(2)).unwrap_err();
    assert!(matches!(err, TallyError::Open { ref path, .. } if *path == missing));
}
