use std::error::Error;

use wavedb::signature_from_file;

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: wavedb <image-file>")?;

    let extracted = signature_from_file(&path)?;

    println!(
        "{path}: {}x{} dc=({:.4}, {:.4}, {:.4})",
        extracted.width, extracted.height, extracted.dc[0], extracted.dc[1], extracted.dc[2]
    );
    for (c, channel) in extracted.signature.coefs.iter().enumerate() {
        println!("channel {c}: {channel:?}");
    }

    Ok(())
}
