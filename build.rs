use semver::Version;

fn main() {
    // gdal-sys publishes the detected version through its `links = "gdal"` metadata
    let version_number = match std::env::var("DEP_GDAL_VERSION_NUMBER") {
        Ok(v) => v,
        Err(_) => panic!("gdal-sys did not report a GDAL version (DEP_GDAL_VERSION_NUMBER)"),
    };
    println!("cargo:rerun-if-env-changed=DEP_GDAL_VERSION_NUMBER");

    // GDAL_VERSION_NUM is encoded as MMmmpprr (major, minor, patch, release)
    let version_number: i64 = version_number
        .trim()
        .parse()
        .unwrap_or_else(|e| panic!("invalid GDAL version number {version_number:?}: {e}"));
    let detected_version = Version::new(
        (version_number / 1_000_000) as u64,
        (version_number / 10_000 % 100) as u64,
        (version_number / 100 % 100) as u64,
    );
    println!("GDAL version: \"{detected_version}\"");

    if detected_version.major < 3 {
        panic!("GDAL {detected_version} is too old, at least 3.0 is required");
    }

    println!("cargo:rustc-cfg=major_is_{}", detected_version.major);

    for major in 3..=detected_version.major {
        println!("cargo:rustc-cfg=major_ge_{major}");
    }

    for minor in 1..=detected_version.minor {
        println!("cargo:rustc-cfg=minor_ge_{minor}");
    }
}
