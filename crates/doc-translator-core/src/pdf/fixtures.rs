//! Small PDFs built with lopdf for unit tests.

#![allow(clippy::unwrap_used)]

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

pub fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

/// `BT /font size Tf r g b rg x y Td (text) Tj ET`
pub fn text_at(
    font: &str,
    size: f32,
    (r, g, b): (f32, f32, f32),
    (x, y): (f32, f32),
    text: &str,
) -> Vec<Operation> {
    vec![
        op("BT", vec![]),
        op("Tf", vec![Object::Name(font.as_bytes().to_vec()), Object::Real(size)]),
        op("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
        op("Td", vec![Object::Real(x), Object::Real(y)]),
        op("Tj", vec![Object::string_literal(text)]),
        op("ET", vec![]),
    ]
}

/// Pages share one resource dictionary on the page tree node, so lookups
/// go through inheritance.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    fonts: Dictionary,
    xobjects: Dictionary,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut fonts = Dictionary::new();
        for (name, base_font) in [("F1", "Helvetica"), ("F2", "Courier")] {
            let font_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Font".to_vec())),
                ("Subtype", Object::Name(b"Type1".to_vec())),
                ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
            ]));
            fonts.set(name, Object::Reference(font_id));
        }

        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            fonts,
            xobjects: Dictionary::new(),
        }
    }

    pub fn page(mut self, operations: Vec<Operation>) -> Self {
        let bytes = Content { operations }.encode().unwrap();
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), bytes));
        let page_id = self.doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            ("Contents", Object::Reference(content_id)),
        ]));
        self.kids.push(Object::Reference(page_id));
        self
    }

    /// 1×1 gray image XObject
    pub fn image(mut self, name: &str) -> Self {
        let image = Stream::new(
            Dictionary::from_iter([
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(1)),
                ("Height", Object::Integer(1)),
                ("ColorSpace", Object::Name(b"DeviceGray".to_vec())),
                ("BitsPerComponent", Object::Integer(8)),
            ]),
            vec![0x80],
        );
        let id = self.doc.add_object(image);
        self.xobjects.set(name, Object::Reference(id));
        self
    }

    /// Form XObject without its own resources
    pub fn form(mut self, name: &str, operations: Vec<Operation>) -> Self {
        let bytes = Content { operations }.encode().unwrap();
        let form = Stream::new(
            Dictionary::from_iter([
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Form".to_vec())),
                (
                    "BBox",
                    Object::Array(vec![0.into(), 0.into(), 595.into(), 842.into()]),
                ),
            ]),
            bytes,
        );
        let id = self.doc.add_object(form);
        self.xobjects.set(name, Object::Reference(id));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let resources = Dictionary::from_iter([
            ("Font", Object::Dictionary(self.fonts)),
            ("XObject", Object::Dictionary(self.xobjects)),
        ]);
        let count = i64::try_from(self.kids.len()).unwrap();
        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(self.kids)),
            ("Count", Object::Integer(count)),
            ("Resources", Object::Dictionary(resources)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 595.into(), 842.into()]),
            ),
        ]);
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        self.doc.save_to(&mut output).unwrap();
        output
    }
}
