//! Reescrita do corpo de uma indicação sobre a primeira página do modelo
//!
//! O modelo é aberto com `lopdf`; cabeçalho e rodapé originais ficam intactos,
//! a área do corpo é coberta por um retângulo branco e o novo texto é desenhado
//! por cima com fontes padrão (Helvetica, Helvetica-Bold, Times-Roman) em
//! WinAnsiEncoding. Fotos JPEG viram uma página de anexo.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::utils::normalization::remove_accents;
use crate::utils::{AppError, AppResult};

const MARGEM: f32 = 50.0;
/// Distância do topo da página até o início do corpo
const TOPO_CORPO: f32 = 340.0;
const BASE_CORPO: f32 = 110.0;
const ENTRELINHA: f32 = 16.0;
const ESPACO_PARAGRAFO: f32 = 8.0;
const MAX_LINHAS_TITULO: usize = 4;

const ALTURA_FOTO: f32 = 200.0;
const ESPACO_FOTOS: f32 = 40.0;

const A4: (f32, f32) = (595.0, 842.0);

/// Valores já resolvidos que vão para o PDF
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CamposRender {
    pub numero: Option<String>,
    pub titulo: Option<String>,
    pub endereco: Option<String>,
    pub justificativa: Option<String>,
    pub data: Option<String>,
    pub autor: Option<String>,
}

impl CamposRender {
    fn tem_corpo(&self) -> bool {
        self.titulo.is_some() || self.endereco.is_some() || self.justificativa.is_some()
    }
}

/// Foto JPEG já baixada
#[derive(Debug, Clone)]
pub struct FotoJpeg {
    pub bytes: Vec<u8>,
    pub largura: u32,
    pub altura: u32,
    pub componentes: u8,
}

impl FotoJpeg {
    /// `None` se os bytes não forem um JPEG com cabeçalho SOF legível
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let (largura, altura, componentes) = jpeg_dimensions(&bytes)?;
        Some(Self {
            bytes,
            largura,
            altura,
            componentes,
        })
    }
}

/// Lê largura, altura e componentes do marcador SOF
pub fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32, u8)> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }

    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = bytes[i + 1];
        // preenchimento e marcadores sem tamanho
        if marker == 0xFF || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            i += 1;
            continue;
        }

        let tamanho = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        let sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if sof {
            if i + 9 >= bytes.len() {
                return None;
            }
            let altura = u16::from_be_bytes([bytes[i + 5], bytes[i + 6]]) as u32;
            let largura = u16::from_be_bytes([bytes[i + 7], bytes[i + 8]]) as u32;
            let componentes = bytes[i + 9];
            return (largura > 0 && altura > 0).then_some((largura, altura, componentes));
        }
        i += 2 + tamanho;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fonte {
    Helvetica,
    HelveticaBold,
    Times,
}

impl Fonte {
    fn recurso(self) -> &'static str {
        match self {
            Fonte::Helvetica => "GbHelv",
            Fonte::HelveticaBold => "GbHelvB",
            Fonte::Times => "GbTimes",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Fonte::Helvetica => "Helvetica",
            Fonte::HelveticaBold => "Helvetica-Bold",
            Fonte::Times => "Times-Roman",
        }
    }

    fn tabela(self) -> &'static [u16; 95] {
        match self {
            Fonte::Helvetica => &LARGURAS_HELVETICA,
            Fonte::HelveticaBold => &LARGURAS_HELVETICA_BOLD,
            Fonte::Times => &LARGURAS_TIMES,
        }
    }

    /// Largura em milésimos de em; acentuadas usam a letra base
    fn largura_char(self, c: char) -> u16 {
        let tabela = self.tabela();
        let base = match c {
            ' '..='~' => c,
            _ => remove_accents(&c.to_string()).chars().next().unwrap_or('?'),
        };
        match base {
            ' '..='~' => tabela[base as usize - 32],
            _ => tabela['o' as usize - 32],
        }
    }

    fn largura(self, texto: &str, tamanho: f32) -> f32 {
        texto.chars().map(|c| self.largura_char(c) as f32).sum::<f32>() * tamanho / 1000.0
    }
}

// Larguras AFM dos caracteres 32..=126
#[rustfmt::skip]
const LARGURAS_HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const LARGURAS_HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const LARGURAS_TIMES: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

/// Codifica em WinAnsi (cp1252); fora da tabela vira `?`
pub fn win_ansi(texto: &str) -> Vec<u8> {
    texto
        .chars()
        .map(|c| match c {
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '\t' => b' ',
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

/// Quebra por palavras; palavra maior que a linha fica sozinha
fn quebrar_linhas(texto: &str, largura_max: f32, fonte: Fonte, tamanho: f32) -> Vec<String> {
    let mut linhas = Vec::new();
    let mut atual = String::new();

    for palavra in texto.split_whitespace() {
        let teste = if atual.is_empty() {
            palavra.to_string()
        } else {
            format!("{} {}", atual, palavra)
        };

        if fonte.largura(&teste, tamanho) <= largura_max {
            atual = teste;
        } else if atual.is_empty() {
            linhas.push(palavra.to_string());
        } else {
            linhas.push(std::mem::replace(&mut atual, palavra.to_string()));
        }
    }

    if !atual.is_empty() {
        linhas.push(atual);
    }
    linhas
}

/// Operações de conteúdo acumuladas para uma página
#[derive(Default)]
struct Pincel {
    ops: Vec<Operation>,
}

impl Pincel {
    fn retangulo_branco(&mut self, x: f32, y: f32, largura: f32, altura: f32) {
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new("rg", vec![1.into(), 1.into(), 1.into()]));
        self.ops.push(Operation::new(
            "re",
            vec![Object::Real(x), Object::Real(y), Object::Real(largura), Object::Real(altura)],
        ));
        self.ops.push(Operation::new("f", vec![]));
        self.ops.push(Operation::new("Q", vec![]));
    }

    fn texto(&mut self, texto: &str, x: f32, y: f32, fonte: Fonte, tamanho: f32) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new("rg", vec![0.into(), 0.into(), 0.into()]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(fonte.recurso().as_bytes().to_vec()), Object::Real(tamanho)],
        ));
        self.ops.push(Operation::new("Td", vec![Object::Real(x), Object::Real(y)]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(texto), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn texto_centralizado(&mut self, texto: &str, largura_pagina: f32, y: f32, fonte: Fonte, tamanho: f32) {
        let x = (largura_pagina - fonte.largura(texto, tamanho)) / 2.0;
        self.texto(texto, x, y, fonte, tamanho);
    }

    fn imagem(&mut self, nome: &str, x: f32, y: f32, largura: f32, altura: f32) {
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![
                Object::Real(largura),
                0.into(),
                0.into(),
                Object::Real(altura),
                Object::Real(x),
                Object::Real(y),
            ],
        ));
        self.ops.push(Operation::new("Do", vec![Object::Name(nome.as_bytes().to_vec())]));
        self.ops.push(Operation::new("Q", vec![]));
    }

    fn encode(self) -> AppResult<Vec<u8>> {
        Content { operations: self.ops }.encode().map_err(pdf_error)
    }
}

fn pdf_error(e: lopdf::Error) -> AppError {
    AppError::InternalError(format!("Falha ao montar PDF: {}", e))
}

fn numero(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Segue referências até um objeto direto
fn resolver<'a>(doc: &'a Document, obj: &'a Object) -> AppResult<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).map_err(pdf_error),
        other => Ok(other),
    }
}

/// Procura uma chave na página e, se ausente, nos nós `Pages` ancestrais
fn herdado(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut atual = Some(page_id);
    while let Some(id) = atual {
        let dict = doc.get_object(id).ok()?.as_dict().ok()?;
        if let Ok(valor) = dict.get(key) {
            return resolver(doc, valor).ok().cloned();
        }
        atual = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn tamanho_pagina(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let Some(Object::Array(caixa)) = herdado(doc, page_id, b"MediaBox") else {
        return A4;
    };
    let valores: Vec<f32> = caixa.iter().filter_map(numero).collect();
    match valores.as_slice() {
        [x0, y0, x1, y1] if x1 > x0 && y1 > y0 => (x1 - x0, y1 - y0),
        _ => A4,
    }
}

fn adicionar_fontes(doc: &mut Document, recursos: &mut Dictionary) -> AppResult<()> {
    let mut fontes = match recursos.get(b"Font") {
        Ok(obj) => resolver(doc, obj)?.as_dict().cloned().unwrap_or_default(),
        Err(_) => Dictionary::new(),
    };

    for fonte in [Fonte::Helvetica, Fonte::HelveticaBold, Fonte::Times] {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => fonte.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fontes.set(fonte.recurso(), id);
    }

    recursos.set("Font", fontes);
    Ok(())
}

/// Recursos efetivos da página como dicionário direto (cópia dos herdados)
fn recursos_da_pagina(doc: &Document, page_id: ObjectId) -> Dictionary {
    herdado(doc, page_id, b"Resources")
        .and_then(|obj| obj.as_dict().ok().cloned())
        .unwrap_or_default()
}

fn conteudos_da_pagina(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(dict) = doc.get_object(page_id).and_then(Object::as_dict) else {
        return Vec::new();
    };
    match dict.get(b"Contents") {
        Ok(Object::Array(itens)) => itens.clone(),
        Ok(obj @ Object::Reference(_)) => vec![obj.clone()],
        _ => Vec::new(),
    }
}

fn desenhar_corpo(pincel: &mut Pincel, campos: &CamposRender, largura: f32, altura: f32) {
    let topo = altura - TOPO_CORPO;
    let largura_texto = largura - MARGEM * 2.0;
    let tem_rodape = campos.data.is_some() || campos.autor.is_some();
    let limite = BASE_CORPO + if tem_rodape { 70.0 } else { 20.0 };

    pincel.retangulo_branco(
        MARGEM - 10.0,
        BASE_CORPO - 10.0,
        largura - MARGEM * 2.0 + 20.0,
        topo - BASE_CORPO + 20.0,
    );

    let mut y = topo - 6.0;
    pincel.texto_centralizado("INDICAÇÃO", largura, y, Fonte::HelveticaBold, 12.0);
    y -= 28.0;

    if let Some(titulo) = &campos.titulo {
        let linhas = quebrar_linhas(&titulo.to_uppercase(), largura_texto, Fonte::HelveticaBold, 11.0);
        for linha in linhas.iter().take(MAX_LINHAS_TITULO) {
            pincel.texto(linha, MARGEM, y, Fonte::HelveticaBold, 11.0);
            y -= ENTRELINHA;
        }
        y -= 6.0;
    }

    if let Some(endereco) = &campos.endereco {
        let rotulo = "Endereço: ";
        let largura_rotulo = Fonte::HelveticaBold.largura(rotulo, 11.0);
        pincel.texto(rotulo, MARGEM, y, Fonte::HelveticaBold, 11.0);

        let linhas = quebrar_linhas(endereco, largura_texto - largura_rotulo, Fonte::Helvetica, 11.0);
        let mut x = MARGEM + largura_rotulo;
        for linha in linhas.iter().take(4) {
            pincel.texto(linha, x, y, Fonte::Helvetica, 11.0);
            y -= ENTRELINHA;
            x = MARGEM;
        }
        y -= 6.0;
    }

    if let Some(justificativa) = &campos.justificativa {
        pincel.texto_centralizado("JUSTIFICATIVA", largura, y, Fonte::HelveticaBold, 12.0);
        y -= 24.0;

        'paragrafos: for paragrafo in justificativa.split('\n').map(str::trim).filter(|p| !p.is_empty()) {
            for linha in quebrar_linhas(paragrafo, largura_texto, Fonte::Times, 11.0) {
                if y < limite {
                    break 'paragrafos;
                }
                pincel.texto(&linha, MARGEM, y, Fonte::Times, 11.0);
                y -= ENTRELINHA;
            }
            y -= ESPACO_PARAGRAFO;
        }
    }
}

fn desenhar_carimbos(pincel: &mut Pincel, campos: &CamposRender, largura: f32, altura: f32) {
    if let Some(numero) = &campos.numero {
        let (x, y) = (largura * 0.65, altura - 100.0);
        pincel.retangulo_branco(x - 5.0, y - 5.0, largura * 0.3 + 10.0, 34.0);
        pincel.texto(&format!("Nº {}", numero), x, y + 6.0, Fonte::HelveticaBold, 12.0);
    }
    if let Some(data) = &campos.data {
        pincel.texto(data, MARGEM, BASE_CORPO + 40.0, Fonte::Helvetica, 10.0);
    }
    if let Some(autor) = &campos.autor {
        pincel.texto(autor, largura * 0.45, BASE_CORPO + 12.0, Fonte::HelveticaBold, 11.0);
    }
}

/// Raiz `Pages` a partir do catálogo
fn raiz_paginas(doc: &Document) -> AppResult<ObjectId> {
    let root = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(pdf_error)?;
    doc.get_object(root)
        .and_then(Object::as_dict)
        .and_then(|catalogo| catalogo.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(pdf_error)
}

fn adicionar_pagina(doc: &mut Document, pages_id: ObjectId, page_id: ObjectId) -> AppResult<()> {
    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(pdf_error)?;

    let mut kids = pages
        .get(b"Kids")
        .and_then(Object::as_array)
        .cloned()
        .unwrap_or_default();
    kids.push(page_id.into());
    let count = pages.get(b"Count").ok().and_then(numero).unwrap_or(0.0) as i64;

    pages.set("Kids", kids);
    pages.set("Count", count + 1);
    Ok(())
}

fn galeria(doc: &mut Document, fotos: &[FotoJpeg], largura: f32, altura: f32) -> AppResult<()> {
    let pages_id = raiz_paginas(doc)?;
    let largura_foto = (largura - 150.0) / 2.0;

    for (pagina_idx, lote) in fotos.chunks(fotos_por_pagina(altura)).enumerate() {
        let mut pincel = Pincel::default();
        let titulo = if pagina_idx == 0 {
            "GALERIA DE FOTOS - ANEXO".to_string()
        } else {
            "GALERIA DE FOTOS - ANEXO (continuação)".to_string()
        };
        pincel.texto(&titulo, MARGEM, altura - 50.0, Fonte::HelveticaBold, 14.0);

        let mut xobjects = Dictionary::new();
        let mut y = altura - 100.0;
        for (i, foto) in lote.iter().enumerate() {
            let nome = format!("GbFoto{}", i + 1);
            let color_space = match foto.componentes {
                1 => "DeviceGray",
                4 => "DeviceCMYK",
                _ => "DeviceRGB",
            };
            let imagem = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => foto.largura as i64,
                    "Height" => foto.altura as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                foto.bytes.clone(),
            );
            xobjects.set(nome.as_str(), doc.add_object(imagem));

            let x = if i % 2 == 0 { MARGEM } else { MARGEM + largura_foto + 50.0 };
            pincel.imagem(&nome, x, y - ALTURA_FOTO, largura_foto, ALTURA_FOTO);
            if i % 2 == 1 {
                y -= ALTURA_FOTO + ESPACO_FOTOS;
            }
        }

        let mut fontes = Dictionary::new();
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Fonte::HelveticaBold.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fontes.set(Fonte::HelveticaBold.recurso(), bold);

        let conteudo = doc.add_object(Stream::new(dictionary! {}, pincel.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(largura), Object::Real(altura)],
            "Resources" => dictionary! {
                "Font" => fontes,
                "XObject" => xobjects,
            },
            "Contents" => conteudo,
        });
        adicionar_pagina(doc, pages_id, page_id)?;
    }

    Ok(())
}

/// Pares de fotos que cabem verticalmente numa página
fn fotos_por_pagina(altura: f32) -> usize {
    let disponivel = altura - 100.0 - MARGEM;
    let linhas = ((disponivel + ESPACO_FOTOS) / (ALTURA_FOTO + ESPACO_FOTOS)).floor().max(1.0) as usize;
    linhas * 2
}

/// Aplica os campos sobre o modelo e devolve o novo PDF
pub fn render_indicacao(original: &[u8], campos: &CamposRender, fotos: &[FotoJpeg]) -> AppResult<Vec<u8>> {
    let mut doc = Document::load_mem(original).map_err(pdf_error)?;
    let page_id = *doc
        .get_pages()
        .values()
        .next()
        .ok_or_else(|| AppError::InternalError("PDF sem páginas".to_string()))?;
    let (largura, altura) = tamanho_pagina(&doc, page_id);

    let mut pincel = Pincel::default();
    if campos.tem_corpo() {
        desenhar_corpo(&mut pincel, campos, largura, altura);
    }
    desenhar_carimbos(&mut pincel, campos, largura, altura);

    if !pincel.ops.is_empty() {
        let mut recursos = recursos_da_pagina(&doc, page_id);
        adicionar_fontes(&mut doc, &mut recursos)?;

        // o conteúdo original fica isolado entre q/Q
        let abre = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let mut fecha = b"Q\n".to_vec();
        fecha.extend(pincel.encode()?);
        let novo = doc.add_object(Stream::new(dictionary! {}, fecha));

        let mut conteudos = vec![Object::Reference(abre)];
        conteudos.extend(conteudos_da_pagina(&doc, page_id));
        conteudos.push(Object::Reference(novo));

        let pagina = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(pdf_error)?;
        pagina.set("Resources", recursos);
        pagina.set("Contents", conteudos);
    }

    if !fotos.is_empty() {
        galeria(&mut doc, fotos, largura, altura)?;
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AppError::InternalError(format!("Falha ao gravar PDF: {}", e)))?;
    Ok(bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// PDF de uma página com um texto de modelo
    pub(crate) fn modelo_pdf(texto: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 760.into()]),
                Operation::new("Tj", vec![Object::string_literal(texto)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    /// Menor JPEG com SOF0 que o leitor de cabeçalho aceita
    pub(crate) fn jpeg_minimo(largura: u16, altura: u16) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00];
        bytes.extend([0xFF, 0xC0, 0x00, 0x11, 0x08]);
        bytes.extend(altura.to_be_bytes());
        bytes.extend(largura.to_be_bytes());
        bytes.extend([0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
        bytes.extend([0xFF, 0xD9]);
        bytes
    }

    fn campos() -> CamposRender {
        CamposRender {
            numero: Some("004/2025".to_string()),
            titulo: Some("Poda de árvores na praça".to_string()),
            endereco: Some("Rua das Palmeiras, 120, Jardim Camburi".to_string()),
            justificativa: Some("Primeiro parágrafo.\n\nSegundo parágrafo com ação.".to_string()),
            data: Some("Vitória, 05 de março de 2025".to_string()),
            autor: Some("Vereadora Ana".to_string()),
        }
    }

    #[test]
    fn test_win_ansi_preserva_acentos() {
        assert_eq!(win_ansi("Ação – ok"), vec![b'A', 0xE7, 0xE3, b'o', b' ', 0x96, b' ', b'o', b'k']);
        assert_eq!(win_ansi("→"), vec![b'?']);
    }

    #[test]
    fn test_largura_usa_letra_base_para_acentos() {
        let sem = Fonte::Helvetica.largura("Acao", 10.0);
        let com = Fonte::Helvetica.largura("Ação", 10.0);
        assert_eq!(sem, com);
        assert_eq!(Fonte::Times.largura(" ", 1000.0), 250.0);
    }

    #[test]
    fn test_quebrar_linhas() {
        let linhas = quebrar_linhas("aaa bbb ccc", Fonte::Helvetica.largura("aaa bbb", 10.0), Fonte::Helvetica, 10.0);
        assert_eq!(linhas, vec!["aaa bbb", "ccc"]);

        let longa = quebrar_linhas("palavraenorme x", 5.0, Fonte::Helvetica, 10.0);
        assert_eq!(longa, vec!["palavraenorme", "x"]);
    }

    #[test]
    fn test_jpeg_dimensions() {
        assert_eq!(jpeg_dimensions(&jpeg_minimo(640, 480)), Some((640, 480, 3)));
        assert_eq!(jpeg_dimensions(b"\x89PNG\r\n\x1a\n"), None);
    }

    #[test]
    fn test_render_escreve_corpo_na_primeira_pagina() {
        let original = modelo_pdf("INDICACAO N XXX/XXXX");
        let bytes = render_indicacao(&original, &campos(), &[]).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let texto = doc.extract_text(&[1]).unwrap();
        assert!(texto.contains("PODA DE"), "texto: {}", texto);
        assert!(texto.contains("JUSTIFICATIVA"));
        assert!(texto.contains("004/2025"));
    }

    #[test]
    fn test_render_adiciona_galeria() {
        let original = modelo_pdf("modelo");
        let fotos: Vec<FotoJpeg> = (0..3)
            .filter_map(|_| FotoJpeg::from_bytes(jpeg_minimo(800, 600)))
            .collect();
        assert_eq!(fotos.len(), 3);

        let bytes = render_indicacao(&original, &CamposRender::default(), &fotos).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_fotos_por_pagina_a4() {
        assert_eq!(fotos_por_pagina(842.0), 6);
    }

    #[test]
    fn test_render_falha_com_bytes_invalidos() {
        assert!(render_indicacao(b"nao e pdf", &campos(), &[]).is_err());
    }
}
