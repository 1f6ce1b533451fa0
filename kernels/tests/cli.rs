use std::process::{Command, Output};

fn polyverify_kernels(args: &[&str]) -> std::io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_polyverify-kernels"))
        .args(args)
        .env_remove("SEED")
        .output()
}

#[test]
fn list_prints_every_kernel() -> std::io::Result<()> {
    let output = polyverify_kernels(&["list"])?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for kernel in ["atax", "spmv-ellpack", "aes", "cnn"] {
        assert!(stdout.contains(kernel), "missing {kernel} in {stdout}");
    }
    Ok(())
}

#[test]
fn passing_check_exits_zero() -> std::io::Result<()> {
    let output = polyverify_kernels(&[
        "check",
        "atax",
        "--transformed",
        "tiled:8",
        "--trials",
        "5",
        "--seed",
        "1",
    ])?;
    assert!(output.status.success(), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("PASS"));
    Ok(())
}

#[test]
fn unknown_kernel_exits_nonzero() -> std::io::Result<()> {
    let output = polyverify_kernels(&["check", "lu", "--transformed", "parallel"])?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn invalid_dtype_exits_nonzero() -> std::io::Result<()> {
    let output = polyverify_kernels(&["all", "gemm", "--dtype", "16"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid dtype"));
    Ok(())
}
