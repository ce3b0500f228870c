use crate::image::{Image, ImageHeader};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write;

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Renders the XML metadata document written next to every archived image,
/// carrying the product version, the VMU acquisition time and the image
/// sub-header fields.
pub fn image_metadata(image: &Image) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<metadata mark=\"{}\" vmu=\"{}\">",
        image.version(),
        rfc3339(image.vmu.timestamp())
    );
    match &image.idh {
        ImageHeader::V1(v) => {
            let _ = write!(out, "\n\t<sequence>{}</sequence>", v.sequence);
            let _ = write!(out, "\n\t<timestamp>{}</timestamp>", rfc3339(v.timestamp()));
            let _ = write!(out, "\n\t<portion>{}</portion>", v.part);
            let _ = write!(out, "\n\t<video>{}</video>", v.video);
            let _ = write!(out, "\n\t<type>{}</type>", v.kind);
            let _ = write!(out, "\n\t<rate>{}</rate>", v.rate);
            let _ = write!(out, "\n\t<pixels>\n\t\t<x>{}</x>\n\t\t<y>{}</y>\n\t</pixels>", v.x(), v.y());
            let (rx, ry) = ((v.region >> 32) as u32, v.region as u32);
            let _ = write!(
                out,
                "\n\t<region>\n\t\t<offset-x>{}</offset-x>\n\t\t<size-x>{}</size-x>\n\t\t<offset-y>{}</offset-y>\n\t\t<size-y>{}</size-y>\n\t</region>",
                (rx >> 16) as u16,
                rx as u16,
                (ry >> 16) as u16,
                ry as u16,
            );
            let _ = write!(
                out,
                "\n\t<drop>\n\t\t<line-drop>{}</line-drop>\n\t\t<frame-drop>{}</frame-drop>\n\t</drop>",
                v.line_drop, v.frame_drop
            );
        }
        ImageHeader::V2(v) => {
            let _ = write!(
                out,
                "\n\t<stream>\n\t\t<properties>{}</properties>\n\t\t<type>{}</type>\n\t</stream>",
                v.properties & 0x0F,
                v.properties >> 4
            );
            let _ = write!(
                out,
                "\n\t<sequences>\n\t\t<stream>{}</stream>\n\t\t<originator>{}</originator>\n\t</sequences>",
                v.sequence, v.originator
            );
            let _ = write!(out, "\n\t<timestamp>{}</timestamp>", rfc3339(v.timestamp()));
            let _ = write!(out, "\n\t<auxiliary>{}</auxiliary>", v.auxiliary);
            let _ = write!(out, "\n\t<type>{}</type>", v.kind);
            let _ = write!(out, "\n\t<pixels>\n\t\t<x>{}</x>\n\t\t<y>{}</y>\n\t</pixels>", v.x(), v.y());
            let (rx, ry) = (v.region as u32, (v.region >> 32) as u32);
            let _ = write!(
                out,
                "\n\t<region>\n\t\t<offset-x>{}</offset-x>\n\t\t<size-x>{}</size-x>\n\t\t<offset-y>{}</offset-y>\n\t\t<size-y>{}</size-y>\n\t</region>",
                rx as u16,
                (rx >> 16) as u16,
                ry as u16,
                (ry >> 16) as u16,
            );
            let _ = write!(out, "\n\t<dropping>{}</dropping>", v.dropping);
            let _ = write!(
                out,
                "\n\t<scaling>\n\t\t<size-x>{}</size-x>\n\t\t<size-y>{}</size-y>\n\t\t<force-aspect-ratio>{}</force-aspect-ratio>\n\t</scaling>",
                v.scaling & 0xFFFF,
                v.scaling >> 16,
                v.ratio
            );
        }
    }
    if let Some(upi) = image.upi() {
        let _ = write!(out, "\n\t<info>{}</info>", escape(&upi));
    }
    out.push_str("\n</metadata>\n");
    out
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn v2_document_carries_header_fields() {
        let image = fixtures::image_v2(fixtures::ImageParams::default());
        let doc = image_metadata(&image);
        assert!(doc.starts_with("<metadata mark=\"2\""));
        assert!(doc.contains("<x>640</x>"));
        assert!(doc.contains("<y>480</y>"));
        assert!(doc.contains("<originator>1000</originator>"));
        assert!(doc.contains("<info>PAYLOAD RUN</info>"));
        assert!(doc.ends_with("</metadata>\n"));
    }

    #[test]
    fn v1_document_uses_the_first_generation_fields() {
        let image = fixtures::image_v1(fixtures::ImageParams { kind: 1, ..fixtures::ImageParams::default() });
        let doc = image_metadata(&image);
        assert!(doc.starts_with("<metadata mark=\"1\""));
        assert!(doc.contains("<sequence>1000</sequence>"));
        assert!(doc.contains("<video>144</video>"));
        assert!(doc.contains("<rate>25</rate>"));
        assert!(!doc.contains("<originator>"), "no v2 elements in a v1 document");
    }

    #[test]
    fn info_element_is_escaped() {
        let image = fixtures::image_v2(fixtures::ImageParams { upi: "A<B&C".to_string(), ..Default::default() });
        let doc = image_metadata(&image);
        assert!(doc.contains("<info>A&lt;B&amp;C</info>"));
    }
}
