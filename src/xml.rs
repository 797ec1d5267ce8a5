//! WebDAV multistatus rendering.
//!
//! PROPFIND responses are `207 Multi-Status` documents in the `DAV:`
//! namespace.  This module produces them with `quick-xml`, one
//! `<D:response>` per resource, in the order resources are pushed.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::dav::resource::ResourceDescriptor;

/// Status line reported for every live property set.
const STATUS_OK: &str = "HTTP/1.1 200 OK";

/// Incremental `<D:multistatus>` writer.
///
/// ```xml
/// <?xml version="1.0" encoding="utf-8"?>
/// <D:multistatus xmlns:D="DAV:">
///   <D:response>
///     <D:href>/docs/</D:href>
///     <D:propstat>
///       <D:prop><D:resourcetype><D:collection/></D:resourcetype></D:prop>
///       <D:status>HTTP/1.1 200 OK</D:status>
///     </D:propstat>
///   </D:response>
/// </D:multistatus>
/// ```
pub struct MultistatusBuilder {
    writer: Writer<Cursor<Vec<u8>>>,
    responses: usize,
}

impl MultistatusBuilder {
    pub fn new() -> Self {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .expect("xml decl");
        let root = BytesStart::new("D:multistatus").with_attributes([("xmlns:D", "DAV:")]);
        writer.write_event(Event::Start(root)).expect("start root");
        Self {
            writer,
            responses: 0,
        }
    }

    /// Append one `<D:response>` for `resource`.
    pub fn push(&mut self, resource: &ResourceDescriptor) {
        let w = &mut self.writer;
        start(w, "D:response");
        write_text_element(w, "D:href", &resource.path);
        start(w, "D:propstat");
        start(w, "D:prop");

        start(w, "D:resourcetype");
        if resource.is_collection {
            w.write_event(Event::Empty(BytesStart::new("D:collection")))
                .expect("collection");
        }
        end(w, "D:resourcetype");

        if !resource.is_collection {
            if let Some(size) = resource.size {
                write_text_element(w, "D:getcontentlength", &size.to_string());
            }
            if let Some(ref modified) = resource.last_modified {
                write_text_element(w, "D:getlastmodified", modified);
            }
            if let Some(ref etag) = resource.etag {
                write_text_element(w, "D:getetag", etag);
            }
            if let Some(ref content_type) = resource.content_type {
                write_text_element(w, "D:getcontenttype", content_type);
            }
        }

        end(w, "D:prop");
        write_text_element(w, "D:status", STATUS_OK);
        end(w, "D:propstat");
        end(w, "D:response");
        self.responses += 1;
    }

    /// Number of responses pushed so far.
    pub fn len(&self) -> usize {
        self.responses
    }

    pub fn is_empty(&self) -> bool {
        self.responses == 0
    }

    /// Close the root element and return the document.
    pub fn finish(mut self) -> String {
        end(&mut self.writer, "D:multistatus");
        String::from_utf8(self.writer.into_inner().into_inner()).expect("valid utf-8")
    }
}

impl Default for MultistatusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn start(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str) {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .expect("start tag");
}

fn end(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str) {
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .expect("end tag");
}

/// Write a `<tag>text</tag>` element with `text` fully escaped.
fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) {
    start(writer, tag);
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .expect("text");
    end(writer, tag);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_multistatus(resources: &[ResourceDescriptor]) -> String {
        let mut builder = MultistatusBuilder::new();
        for resource in resources {
            builder.push(resource);
        }
        builder.finish()
    }

    fn file(path: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            path: path.to_string(),
            is_collection: false,
            size: Some(11),
            last_modified: Some("Sun, 06 Nov 1994 08:49:37 GMT".to_string()),
            etag: Some("\"abc\"".to_string()),
            content_type: Some("text/plain".to_string()),
        }
    }

    #[test]
    fn test_empty_document() {
        let xml = render_multistatus(&[]);
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
             <D:multistatus xmlns:D=\"DAV:\"></D:multistatus>"
        );
    }

    #[test]
    fn test_collection_response() {
        let xml = render_multistatus(&[ResourceDescriptor::collection("/docs/")]);
        assert!(xml.contains(
            "<D:response><D:href>/docs/</D:href><D:propstat><D:prop>\
             <D:resourcetype><D:collection/></D:resourcetype></D:prop>\
             <D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>"
        ));
        assert!(!xml.contains("getcontentlength"));
    }

    #[test]
    fn test_file_response_has_live_properties() {
        let xml = render_multistatus(&[file("/a.txt")]);
        assert!(xml.contains("<D:resourcetype></D:resourcetype>"));
        assert!(xml.contains("<D:getcontentlength>11</D:getcontentlength>"));
        assert!(xml
            .contains("<D:getlastmodified>Sun, 06 Nov 1994 08:49:37 GMT</D:getlastmodified>"));
        assert!(xml.contains("<D:getetag>&quot;abc&quot;</D:getetag>"));
        assert!(xml.contains("<D:getcontenttype>text/plain</D:getcontenttype>"));
        assert!(!xml.contains("<D:collection/>"));
    }

    #[test]
    fn test_bare_file_has_only_resourcetype() {
        let xml = render_multistatus(&[ResourceDescriptor::bare_file("/gone")]);
        assert!(xml.contains("<D:href>/gone</D:href>"));
        assert!(xml.contains("<D:status>HTTP/1.1 200 OK</D:status>"));
        assert!(!xml.contains("getcontentlength"));
    }

    #[test]
    fn test_href_escaping() {
        let xml = render_multistatus(&[file("/a&b")]);
        assert!(xml.contains("<D:href>/a&amp;b</D:href>"));

        let xml = render_multistatus(&[file("/<x>'y'\"z\"&")]);
        assert!(xml.contains("<D:href>/&lt;x&gt;&apos;y&apos;&quot;z&quot;&amp;</D:href>"));
    }

    #[test]
    fn test_order_is_preserved() {
        let mut builder = MultistatusBuilder::new();
        builder.push(&ResourceDescriptor::collection("/dir/"));
        builder.push(&file("/dir/z"));
        builder.push(&file("/dir/a"));
        assert_eq!(builder.len(), 3);
        let xml = builder.finish();

        let first = xml.find("<D:href>/dir/</D:href>").unwrap();
        let second = xml.find("<D:href>/dir/z</D:href>").unwrap();
        let third = xml.find("<D:href>/dir/a</D:href>").unwrap();
        assert!(first < second && second < third);
    }
}
