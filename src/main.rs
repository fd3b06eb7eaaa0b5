use std::io::Cursor;
use std::sync::Arc;

// Declare the application modules
mod convert;
mod state;
mod store;
mod text;

use state::admin::AdminController;
use state::data::Side;
use state::public::{slot_view, PublicController, SlotView};
use store::auth::LocalAuth;
use store::blobs::FsBlobStore;
use store::records::RecordStore;
use store::sqlite::SqliteRecordStore;

/// Demonstration pass over the whole stack: open the local stores, sign
/// the operator in, seed a sample pair on first run, then print the
/// public gallery the way the viewer page would render it.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let records = Arc::new(SqliteRecordStore::open()?);
    let blobs = Arc::new(FsBlobStore::open()?);

    let email =
        std::env::var("CARD_GALLERY_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
    let password =
        std::env::var("CARD_GALLERY_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
    let auth = Arc::new(LocalAuth::new().with_user(&email, &password));

    let record_count = records.record_count()?;
    println!("🎴 Card gallery initialized with {} records", record_count);

    let mut admin = AdminController::new(records.clone(), blobs.clone(), auth);
    admin.sign_in(&email, &password).await?;

    if record_count == 0 {
        println!("✨ Empty catalog, seeding a sample pair...");
        for (side, color) in [
            ("front", image::Rgb([180u8, 40, 40])),
            ("back", image::Rgb([40u8, 40, 180])),
        ] {
            let created = admin
                .create_record("Sample", side, 1.0, Some(&sample_image(color)))
                .await?;
            println!("📤 Uploaded {} face as {}", side, created.storage_path);
        }
    }

    let mut public = PublicController::new(records.clone() as Arc<dyn RecordStore>, blobs.clone());
    public.start();

    let pairs = public.pairs();
    println!("🖼️  Public gallery: {} pair(s)", pairs.len());
    for pair in &pairs {
        println!(
            "— {} · order {}",
            pair.category,
            text::format_order(pair.order)
        );
        for side in [Side::Front, Side::Back] {
            match slot_view(pair, side) {
                SlotView::Image(record) => {
                    let download = public.download(&record).await?;
                    println!("   {}: {} -> {}", side, download.filename, download.url);
                }
                SlotView::Placeholder(label) => {
                    println!("   {}: [{}]", side, label);
                }
            }
        }
    }

    public.stop();
    admin.sign_out();
    Ok(())
}

/// Tiny solid-color image used to seed the catalog on first run.
fn sample_image(color: image::Rgb<u8>) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(64, 96, color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode sample image");
    out.into_inner()
}
