use imgproc_client::{ClientError, CodecDecoder, ImageClient, ImageDecoder, RawDecoder};
use tracing::debug;

use crate::cmd::{ClientArgs, FetchArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_images, ImageRow, OutputFormat};

pub fn run(args: FetchArgs, client: &ClientArgs, format: OutputFormat) -> CliResult<i32> {
    let images = ImageClient::connect_with_decoder(client.config()?, RawDecoder)
        .map_err(|err| client_error("connect failed", err))?;

    let frames = images
        .ask_for_images(&args.paths, args.width, args.height)
        .map_err(|err| client_error("fetch failed", err))?;
    debug!(frames = frames.len(), "images received");

    let mut rows = Vec::with_capacity(frames.len());
    for (index, (frame, path)) in frames.into_iter().zip(&args.paths).enumerate() {
        let bytes = frame.len();
        let image = CodecDecoder.decode(frame).map_err(|source| {
            client_error(
                "fetch failed",
                ClientError::Decode {
                    index,
                    path: path.clone(),
                    source,
                },
            )
        })?;
        rows.push(ImageRow {
            index,
            path: path.clone(),
            width: image.width(),
            height: image.height(),
            bytes,
        });
    }

    print_images(&rows, format);
    Ok(SUCCESS)
}
